use crate::attributes::AttributeSource;
use crate::config::LoadOptions;
use crate::dataset::Dataset;
use crate::enums::SortBy;
use crate::error::ViewerError;
use crate::normalizer::{DecodedFrame, compute_frames, decode_instance};

use dicom::object::{FileDicomObject, InMemDicomObject, open_file};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::{fs, path::Path};

pub struct DatasetLoader;

impl DatasetLoader {
    /// Load a dataset from DICOM file objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `options` - Frame ordering and volume settings, or just a [`SortBy`]
    ///
    /// # Errors
    ///
    /// Returns an error if no frames were found or any instance fails to
    /// normalize. One bad instance aborts the whole dataset.
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        options: impl Into<LoadOptions>,
    ) -> Result<Dataset, ViewerError> {
        let sources: Vec<&InMemDicomObject> = dicom_objects.iter().map(|o| &**o).collect();
        Self::load_from_sources(&sources, options.into())
    }

    /// Load a dataset from parsed data sets without file meta information
    pub fn load_from_instances(
        instances: &[InMemDicomObject],
        options: impl Into<LoadOptions>,
    ) -> Result<Dataset, ViewerError> {
        let sources: Vec<&InMemDicomObject> = instances.iter().collect();
        Self::load_from_sources(&sources, options.into())
    }

    /// Load a dataset from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        options: impl Into<LoadOptions>,
    ) -> Result<Dataset, ViewerError> {
        let objects: Result<Vec<_>, _> = paths
            .par_iter()
            .map(|path| open_file(path.as_ref()))
            .collect();

        Self::load_from_dicom_objects(&objects?, options)
    }

    /// Load a dataset from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        options: impl Into<LoadOptions>,
    ) -> Result<Dataset, ViewerError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(ViewerError::NoValidImages);
        }

        Self::load_from_file_paths(&paths, options)
    }

    /// Load from any attribute source. Instances are decoded in parallel.
    pub fn load_from_sources<S: AttributeSource + Sync>(
        sources: &[&S],
        options: LoadOptions,
    ) -> Result<Dataset, ViewerError> {
        let decoded: Vec<Vec<DecodedFrame>> = sources
            .par_iter()
            .map(|source| decode_instance(*source))
            .collect::<Result<_, _>>()?;
        let mut decoded: Vec<DecodedFrame> = decoded.into_iter().flatten().collect();

        if decoded.is_empty() {
            return Err(ViewerError::NoValidImages);
        }

        Self::sort_frames(&mut decoded, options.sort_by);
        let frames = compute_frames(decoded);
        log::info!(
            "Loaded {} frames from {} instances",
            frames.len(),
            sources.len()
        );

        Dataset::new(frames, options.min_volume_frames)
    }

    fn sort_frames(frames: &mut [DecodedFrame], sort_by: SortBy) {
        match sort_by {
            SortBy::Identifier => frames.sort_by(|a, b| {
                compare_uids(&a.instance_uid, &b.instance_uid)
                    .then(a.frame_index.cmp(&b.frame_index))
            }),
            SortBy::InstanceNumber => frames.sort_by(|a, b| {
                let key = |f: &DecodedFrame| f.instance_number.unwrap_or(i32::MAX);
                key(a)
                    .cmp(&key(b))
                    .then(a.frame_index.cmp(&b.frame_index))
            }),
            SortBy::SliceLocation => frames.sort_by(|a, b| {
                a.sort_location()
                    .partial_cmp(&b.sort_location())
                    .unwrap_or(Ordering::Equal)
                    .then(a.frame_index.cmp(&b.frame_index))
            }),
            SortBy::None => {}
        }
    }
}

/// Orders UIDs component by component, numerically where possible, so
/// `1.2.9` sorts before `1.2.10`.
fn compare_uids(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (x.parse::<u128>(), y.parse::<u128>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}
