//! Lightcurve - resumable aperture photometry over frame sequences.
//!
//! For every frame matching a session's pattern and for every configured
//! region, the sky is estimated in an annulus, the aperture is recentered on
//! the star, and the enclosed flux is integrated with exact pixel coverage.
//! One record per frame is appended to a plain-text session log that doubles
//! as the session's configuration and its resume journal.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lightcurve::{Aperture, FitsDirectory, ReductionSession, SessionConfig, SessionSetup};
//!
//! let source = FitsDirectory::new("night1");
//! let setup = SessionSetup::new("run_*.fits", start_time)
//!     .with_region(Aperture::new(512.3, 401.8, 8.0, 16.0)?);
//! ReductionSession::create("night1/run.dat", &setup)?;
//!
//! let mut session = ReductionSession::open("night1/run.dat", &source)?;
//! let summary = session.run(&source, &SessionConfig::default())?;
//! println!("{} new frames", summary.processed);
//! ```

pub mod frame;
pub mod master_dark;
pub(crate) mod math;
pub mod photometry;
pub mod session;

#[cfg(test)]
pub mod testing;

/// Single-channel frame data, `image[(x, y)]`.
pub type Image = common::Buffer2<f64>;

// ============================================================================
// Photometry
// ============================================================================

pub use photometry::{
    Aperture, BackgroundEstimate, CentroidConfig, FrameProcessor, PhotometryError, RegionFlux,
};

// ============================================================================
// Frames
// ============================================================================

pub use frame::{FitsDirectory, Frame, FrameError, FrameHeader, FrameSource};

// ============================================================================
// Session
// ============================================================================

pub use master_dark::{DarkError, MasterDark, Rejection};
pub use session::{
    ReductionSession, RunSummary, SessionConfig, SessionError, SessionSetup, TimeAnchor,
};
