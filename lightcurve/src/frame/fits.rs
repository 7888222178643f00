use std::path::{Path, PathBuf};

use fitsio::FitsFile;
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};

use super::{Frame, FrameError, FrameHeader, FrameSource};
use crate::Image;

/// Frames stored as FITS files in one directory.
#[derive(Debug, Clone)]
pub struct FitsDirectory {
    dir: PathBuf,
}

impl FitsDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of frame `name`. Absolute names are used as-is.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl FrameSource for FitsDirectory {
    fn list(&self, pattern: &str) -> Result<Vec<String>, FrameError> {
        common::file_utils::sorted_matching_files(&self.dir, pattern).map_err(|source| {
            if source.kind() == std::io::ErrorKind::InvalidInput {
                FrameError::Pattern {
                    pattern: pattern.to_string(),
                    reason: source.to_string(),
                }
            } else {
                FrameError::Io {
                    path: self.dir.clone(),
                    source,
                }
            }
        })
    }

    fn load(&self, name: &str) -> Result<Frame, FrameError> {
        load_fits(&self.path_of(name))
    }
}

/// Load the primary HDU of a 2-D FITS image as `f64` plus the header keys
/// the reduction reads.
pub fn load_fits(path: &Path) -> Result<Frame, FrameError> {
    let fits_err = |source| FrameError::Fits {
        path: path.to_path_buf(),
        source,
    };

    let mut fptr = FitsFile::open(path).map_err(fits_err)?;
    let hdu = fptr.primary_hdu().map_err(fits_err)?;

    // fitsio reports the shape as [NAXIS2, NAXIS1] = [height, width].
    let (height, width) = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => (shape[0], shape[1]),
        HduInfo::ImageInfo { shape, .. } => {
            return Err(FrameError::NotAnImage {
                path: path.to_path_buf(),
                shape: shape.clone(),
            });
        }
        _ => {
            return Err(FrameError::NotAnImage {
                path: path.to_path_buf(),
                shape: Vec::new(),
            });
        }
    };

    let pixels: Vec<f64> = hdu.read_image(&mut fptr).map_err(fits_err)?;

    let header = FrameHeader {
        exptime: read_key_optional(&hdu, &mut fptr, "EXPTIME"),
        utc_date: read_key_optional(&hdu, &mut fptr, "UTC-DATE"),
        utc_beg: read_key_optional(&hdu, &mut fptr, "UTC-BEG"),
        utc_end: read_key_optional(&hdu, &mut fptr, "UTC-END"),
        gpstime: read_key_optional(&hdu, &mut fptr, "GPSTIME"),
        utc: read_key_optional(&hdu, &mut fptr, "UTC"),
    };

    tracing::trace!(path = %path.display(), width, height, "Loaded FITS frame");

    Ok(Frame {
        image: Image::new(width, height, pixels),
        header,
    })
}

/// Write `frame` as a single-HDU `f64` FITS image, replacing any existing
/// file, with every present header key.
pub fn save_fits(path: &Path, frame: &Frame) -> Result<(), FrameError> {
    let fits_err = |source| FrameError::Fits {
        path: path.to_path_buf(),
        source,
    };

    // fitsio refuses to overwrite.
    if path.exists() {
        std::fs::remove_file(path).map_err(|source| FrameError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[frame.image.height(), frame.image.width()],
    };

    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .open()
        .map_err(fits_err)?;
    let hdu = fptr.primary_hdu().map_err(fits_err)?;
    hdu.write_image(&mut fptr, frame.image.pixels())
        .map_err(fits_err)?;

    let header = &frame.header;
    if let Some(exptime) = header.exptime {
        hdu.write_key(&mut fptr, "EXPTIME", exptime).map_err(fits_err)?;
    }
    let strings = [
        ("UTC-DATE", &header.utc_date),
        ("UTC-BEG", &header.utc_beg),
        ("UTC-END", &header.utc_end),
        ("GPSTIME", &header.gpstime),
        ("UTC", &header.utc),
    ];
    for (key, value) in strings {
        if let Some(value) = value {
            hdu.write_key(&mut fptr, key, value.as_str()).map_err(fits_err)?;
        }
    }

    Ok(())
}

fn read_key_optional<T: fitsio::headers::ReadsKey>(
    hdu: &FitsHdu,
    fptr: &mut FitsFile,
    key: &str,
) -> Option<T> {
    hdu.read_key(fptr, key).ok()
}
