pub type AudiogramResult<T> = Result<T, AudiogramError>;

#[derive(thiserror::Error, Debug)]
pub enum AudiogramError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("ffmpeg is not ready, make sure you have completed load()")]
    NotReady,

    #[error("ffmpeg was loaded, you should not load it again, use is_loaded() to check next time")]
    AlreadyLoaded,

    #[error("ffmpeg can only run one command at a time")]
    Busy,

    #[error("{0}")]
    Fs(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("upload error: {0}")]
    Upload(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AudiogramError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn fs(msg: impl Into<String>) -> Self {
        Self::Fs(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }
}
