#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Scan aborted")]
    Aborted,
    #[error("Scan type {0:?} requires a fingerprint provider")]
    FingerprintProviderMissing(crate::types::ScanType),
}

pub type Result<T> = std::result::Result<T, Error>;
