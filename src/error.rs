use std::fmt;

#[derive(Debug)]
pub enum RollPressError {
    EmptyRoster,
    MissingGroupField { index: usize, field: String },
    InvalidConfiguration(String),
    Asset(String),
    Render { key: String, message: String },
    Io(std::io::Error),
}

impl fmt::Display for RollPressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollPressError::EmptyRoster => write!(f, "no candidate rows in the uploaded roster"),
            RollPressError::MissingGroupField { index, field } => {
                write!(f, "row {} has no value for grouping field {:?}", index + 1, field)
            }
            RollPressError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            RollPressError::Asset(message) => write!(f, "asset error: {}", message),
            RollPressError::Render { key, message } => {
                write!(f, "failed to render center {}: {}", key, message)
            }
            RollPressError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for RollPressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RollPressError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RollPressError {
    fn from(value: std::io::Error) -> Self {
        RollPressError::Io(value)
    }
}
