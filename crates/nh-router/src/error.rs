use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("no eligible targets after routing")]
    NoEligibleTargets,
}
