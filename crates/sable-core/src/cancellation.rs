use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 请求分发的取消令牌。
///
/// # 设计背景（Why）
/// - 传输层在客户端断开等场景需要通知分发引擎停止推进后续中间件与处理器；
/// - 取消是协作式的：引擎只在步骤之间检查，已经开始执行的回调会运行到自身结束。
///
/// # 逻辑解析（How）
/// - 内部使用 [`AtomicBool`] 表达取消状态，并通过 [`Arc`] 支持多方共享；
/// - `cancel` 在首次成功设置取消位时返回 `true`，后续重复调用返回 `false`；
/// - `child` 生成共享同一原子位的派生实例。
///
/// # 契约说明（What）
/// - **前置条件**：默认处于“未取消”状态；
/// - **后置条件**：一旦 `cancel` 成功，所有克隆都能观测到 `is_cancelled() == true`。
///
/// # 设计取舍与风险（Trade-offs）
/// - 未提供唤醒回调，长时间挂起的中间件需要自行轮询令牌。
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// 创建处于“未取消”状态的取消令牌。
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询当前是否已被标记取消。
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// 将令牌标记为取消。
    ///
    /// 返回值为 `true` 表示本次调用首次触发取消；返回 `false` 表示之前已被取消。
    pub fn cancel(&self) -> bool {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 派生共享同一原子位的子令牌。
    pub fn child(&self) -> Self {
        self.clone()
    }

    /// 若已取消则返回 [`SableError::Cancelled`](crate::SableError::Cancelled)。
    pub fn check(&self, step: &str) -> crate::Result<()> {
        if self.is_cancelled() {
            return Err(crate::SableError::Cancelled {
                step: step.to_owned(),
            });
        }
        Ok(())
    }
}
