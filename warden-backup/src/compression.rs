//! Compression codec negotiation.
//!
//! Priority is fixed: zstd, then xz, then gzip. The first codec whose tool
//! is on `PATH` wins and is remembered for the negotiator's lifetime.

use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;

use crate::error::BackupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Zstd,
    Xz,
    Gzip,
}

impl Codec {
    /// Host binary that has to be present for tar to use the codec.
    pub fn tool(self) -> &'static str {
        match self {
            Codec::Zstd => "zstd",
            Codec::Xz => "xz",
            Codec::Gzip => "gzip",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressionInfo {
    pub codec: Codec,
    pub extension: &'static str,
    pub tar_flag: &'static str,
}

pub const ZSTD: CompressionInfo = CompressionInfo {
    codec: Codec::Zstd,
    extension: ".tar.zst",
    tar_flag: "--zstd",
};

pub const XZ: CompressionInfo = CompressionInfo {
    codec: Codec::Xz,
    extension: ".tar.xz",
    tar_flag: "-J",
};

pub const GZIP: CompressionInfo = CompressionInfo {
    codec: Codec::Gzip,
    extension: ".tar.gz",
    tar_flag: "-z",
};

/// Best first.
pub const PRIORITY: [CompressionInfo; 3] = [ZSTD, XZ, GZIP];

/// Codec for an archive filename, by suffix. Pure.
pub fn info_from_extension(filename: &str) -> Option<CompressionInfo> {
    PRIORITY
        .into_iter()
        .find(|info| filename.ends_with(info.extension))
}

type Locator = Box<dyn Fn(&str) -> bool + Send + Sync>;

pub struct CompressionNegotiator {
    locate: Locator,
    best: OnceLock<CompressionInfo>,
}

impl fmt::Debug for CompressionNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionNegotiator")
            .field("best", &self.best.get())
            .finish_non_exhaustive()
    }
}

impl Default for CompressionNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionNegotiator {
    /// Looks tools up on `PATH`.
    pub fn new() -> Self {
        Self::with_locator(|tool| which::which(tool).is_ok())
    }

    pub fn with_locator(locate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            locate: Box::new(locate),
            best: OnceLock::new(),
        }
    }

    /// Highest-priority installed codec. Probes at most once per successful
    /// negotiation; a failed negotiation is retried on the next call.
    pub fn detect_best(&self) -> Result<CompressionInfo, BackupError> {
        if let Some(best) = self.best.get() {
            return Ok(*best);
        }
        let found = PRIORITY
            .into_iter()
            .find(|info| (self.locate)(info.codec.tool()))
            .ok_or(BackupError::NoCompressionAvailable)?;
        tracing::debug!(codec = %found.codec, "compression negotiated");
        Ok(*self.best.get_or_init(|| found))
    }

    pub fn is_available(&self, codec: Codec) -> bool {
        (self.locate)(codec.tool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn extension_lookup() {
        assert_eq!(info_from_extension("a_backup_x.tar.zst"), Some(ZSTD));
        assert_eq!(info_from_extension("a_backup_x.tar.xz"), Some(XZ));
        assert_eq!(info_from_extension("a_backup_x.tar.gz"), Some(GZIP));
        assert_eq!(info_from_extension("a_backup_x.zip"), None);
        assert_eq!(info_from_extension("a_backup_x.tar"), None);
    }

    #[test]
    fn prefers_zstd_then_xz_then_gzip() {
        let only_gzip = CompressionNegotiator::with_locator(|tool| tool == "gzip");
        assert_eq!(only_gzip.detect_best().unwrap().codec, Codec::Gzip);

        let xz_and_gzip = CompressionNegotiator::with_locator(|tool| tool != "zstd");
        assert_eq!(xz_and_gzip.detect_best().unwrap().codec, Codec::Xz);

        let all = CompressionNegotiator::with_locator(|_| true);
        assert_eq!(all.detect_best().unwrap(), ZSTD);
    }

    #[test]
    fn nothing_installed_fails() {
        let none = CompressionNegotiator::with_locator(|_| false);
        let err = none.detect_best().unwrap_err();
        assert!(matches!(err, BackupError::NoCompressionAvailable));
    }

    #[test]
    fn result_is_cached() {
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probes);
        let negotiator = CompressionNegotiator::with_locator(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        negotiator.detect_best().unwrap();
        negotiator.detect_best().unwrap();
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tar_flags() {
        assert_eq!(ZSTD.tar_flag, "--zstd");
        assert_eq!(XZ.tar_flag, "-J");
        assert_eq!(GZIP.tar_flag, "-z");
    }
}
