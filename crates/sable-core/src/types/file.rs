use std::path::{Path, PathBuf};

use serde::Serialize;

/// 表单请求中的上传文件描述。
///
/// 只记录传输层已经落盘的位置与元信息，读写磁盘属于外部协作方。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct File {
    filepath: PathBuf,
    content_type: Option<String>,
    filename: String,
    filename_ext: Option<String>,
}

impl File {
    pub fn new(filepath: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let filename_ext = Path::new(&filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_owned);
        Self {
            filepath: filepath.into(),
            content_type: None,
            filename,
            filename_ext,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn filename_ext(&self) -> Option<&str> {
        self.filename_ext.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_derived_from_filename() {
        let file = File::new("/tmp/upload-1", "avatar.png").with_content_type("image/png");
        assert_eq!(file.filename_ext(), Some("png"));
        assert_eq!(file.content_type(), Some("image/png"));
        assert_eq!(File::new("/tmp/upload-2", "README").filename_ext(), None);
    }
}
