//! A complete merge run: copy the base into a staging file next to the
//! output, merge every donor into it, save it, then move it into place.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::config::Config;
use crate::document::MissionDocument;
use crate::error::RunError;
use crate::ids::IdKind;
use crate::merge::{MergeError, MergeOutcome, NameVariants};
use crate::report::{DonorReport, FailedMerge, MergeReport};

/// Merge every configured group variant that `donor` offers into
/// `recipient`.
///
/// Variants the donor lacks are ignored. Groups the recipient already has are
/// reported as skipped. A group that runs out of ids is logged at error level
/// and reported as failed; the remaining groups are still merged.
///
/// # Errors
/// Any other [`MergeError`] (most notably a missing destination country)
/// stops the donor and is returned.
pub fn merge_donor(
    recipient: &mut MissionDocument,
    donor: &mut MissionDocument,
    variants: &NameVariants,
) -> Result<DonorReport, MergeError> {
    let mut report = DonorReport {
        donor: donor.source().map(Path::to_owned).unwrap_or_default(),
        ..DonorReport::default()
    };
    for name in variants.variants() {
        if !donor.index().contains(&name) {
            continue;
        }
        match recipient.merge_group_from(donor, &name) {
            Ok(MergeOutcome::Merged(merged)) => report.merged.push(merged),
            Ok(MergeOutcome::Skipped { name }) => report.skipped.push(name),
            Err(e @ MergeError::IdentifierExhausted(_)) => {
                tracing::error!(group = %name, error = %e, "group not merged");
                report.failed.push(FailedMerge {
                    name,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

/// Copy `base` to a staging file beside `output`, merge the configured groups
/// of every donor into the copy, save it, and move it to `output`.
///
/// # Errors
/// Returns a [`RunError`] if the output would replace the base, a file cannot
/// be copied, loaded or saved, or a merge fails for a reason other than id
/// exhaustion. The base is never modified, and `output` is only written when
/// the whole run succeeds.
#[instrument(skip_all, fields(base = %base.display(), output = %output.display()))]
pub fn merge_missions(
    base: &Path,
    donors: &[PathBuf],
    output: &Path,
    config: &Config,
) -> Result<MergeReport, RunError> {
    if same_file(base, output) {
        return Err(RunError::OutputIsBase {
            path: output.to_owned(),
        });
    }
    if output.exists() {
        tracing::warn!("output exists and will be overwritten");
    }
    let copy_error = |source| RunError::Copy {
        from: base.to_owned(),
        to: output.to_owned(),
        source,
    };
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    // Removed on drop, so a failed run leaves nothing under the output name.
    let staging = tempfile::Builder::new()
        .prefix(".miz-merge-")
        .suffix(".miz")
        .tempfile_in(dir)
        .map_err(copy_error)?;
    std::fs::copy(base, staging.path()).map_err(copy_error)?;

    let options = config.document_options();
    let variants = config.name_variants();
    let mut recipient =
        MissionDocument::load(staging.path(), options.clone()).map_err(|e| e.in_file(base))?;

    let mut reports = Vec::with_capacity(donors.len());
    for path in donors {
        if same_file(path, base) || same_file(path, output) {
            tracing::warn!(donor = %path.display(), "donor is the base mission; ignoring");
            continue;
        }
        let mut donor = MissionDocument::load(path, options.clone()).map_err(|e| e.in_file(path))?;
        let report =
            merge_donor(&mut recipient, &mut donor, &variants).map_err(|source| RunError::Merge {
                donor: path.clone(),
                source,
            })?;
        tracing::info!(
            donor = %path.display(),
            merged = report.merged.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "donor done"
        );
        reports.push(report);
    }

    let report = MergeReport {
        base: base.to_owned(),
        output: output.to_owned(),
        donors: reports,
        group_ids: recipient.ids().len(IdKind::Group),
        unit_ids: recipient.ids().len(IdKind::Unit),
        parking_conflicts: recipient.parking().conflicts().to_vec(),
    };
    recipient
        .save(staging.path())
        .map_err(|e| e.in_file(output))?;
    staging.persist(output).map_err(|e| RunError::Persist {
        path: output.to_owned(),
        source: e.error,
    })?;
    Ok(report)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
