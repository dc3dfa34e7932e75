use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of one FIX session: protocol version, both comp ids and an
/// optional qualifier. An empty qualifier means "no qualifier".
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SessionKey {
    begin_string: String,
    sender_comp_id: String,
    target_comp_id: String,
    #[serde(default)]
    qualifier: String,
}

impl SessionKey {
    pub fn new(
        begin_string: impl Into<String>,
        sender_comp_id: impl Into<String>,
        target_comp_id: impl Into<String>,
    ) -> Self {
        Self {
            begin_string: begin_string.into(),
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
            qualifier: String::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    pub fn sender_comp_id(&self) -> &str {
        &self.sender_comp_id
    }

    pub fn target_comp_id(&self) -> &str {
        &self.target_comp_id
    }

    /// The qualifier, empty when the session has none.
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// The four key columns in storage order.
    pub fn columns(&self) -> [&str; 4] {
        [
            &self.begin_string,
            &self.sender_comp_id,
            &self.target_comp_id,
            &self.qualifier,
        ]
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        )?;
        if !self.qualifier.is_empty() {
            write!(f, ":{}", self.qualifier)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid session key {input:?}: expected BEGIN:SENDER->TARGET[:QUALIFIER]")]
pub struct ParseSessionKeyError {
    pub input: String,
}

impl FromStr for SessionKey {
    type Err = ParseSessionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSessionKeyError {
            input: s.to_string(),
        };

        let (begin, rest) = s.split_once(':').ok_or_else(err)?;
        let (sender, rest) = rest.split_once("->").ok_or_else(err)?;
        let (target, qualifier) = match rest.split_once(':') {
            Some((target, qualifier)) => (target, qualifier),
            None => (rest, ""),
        };

        if begin.is_empty() || sender.is_empty() || target.is_empty() {
            return Err(err());
        }

        Ok(Self::new(begin, sender, target).with_qualifier(qualifier))
    }
}
