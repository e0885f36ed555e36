//! Integration tests for whole merge runs over real `.miz` archives.
//!
//! Coverage:
//! - Stingray scenario: two donor groups into a one-group recipient, with a
//!   unit id clash renumbered
//! - Base mission untouched, side entries of the archive preserved
//! - Merging an existing name is a no-op
//! - Airborne groups leave no parking records; ground starts do
//! - Parking collisions are reported, not blocking
//! - Missing destination country aborts the run
//! - Id uniqueness after arbitrary merge sequences (proptest)

mod common;

use std::collections::BTreeSet;

use common::{GroupSpec, all_unique, collect_ids, mission_text, write_miz};
use mizmerge::archive;
use mizmerge::config::Config;
use mizmerge::document::{DocumentOptions, MissionDocument};
use mizmerge::error::RunError;
use mizmerge::ids::IdKind;
use mizmerge::merge::{MergeError, MergeOutcome, NameVariants};
use mizmerge::pipeline::{merge_donor, merge_missions};
use mizmerge::schema;

fn config() -> Config {
    let mut config = Config::default();
    config.ids.seed = Some(7);
    config
}

fn recipient_text() -> String {
    mission_text(&[("Germany", vec![GroupSpec::airborne("Alpha", 801, &[901])])])
}

fn donor_text() -> String {
    mission_text(&[(
        "Germany",
        vec![
            GroupSpec::airborne("Stingray 1", 801, &[901]),
            GroupSpec::airborne("Stingray 2", 802, &[902]),
        ],
    )])
}

fn options() -> DocumentOptions {
    config().document_options()
}

// ---------------------------------------------------------------------------
// End-to-end
// ---------------------------------------------------------------------------

#[test]
fn stingray_groups_are_merged_with_fresh_ids() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_miz(dir.path(), "VGAF_base.miz", &recipient_text());
    let donor = write_miz(dir.path(), "VGAF_donor.miz", &donor_text());
    let output = dir.path().join("VGAF_out.miz");

    let report = merge_missions(&base, &[donor], &output, &config()).unwrap();
    assert_eq!(report.merged_count(), 2);
    assert_eq!(report.skipped_count(), 0);
    assert_eq!(report.failed_count(), 0);
    assert_eq!(report.group_ids, 3);
    assert_eq!(report.unit_ids, 3);

    let merged = &report.donors[0].merged;
    assert_eq!(merged[0].name, "Stingray 1");
    assert_eq!(merged[0].renamed_units.len(), 1);
    assert_eq!(merged[0].renamed_units[0].old, Some(901));
    assert_eq!(merged[1].name, "Stingray 2");
    assert!(merged[1].renamed_units.is_empty());

    let result = MissionDocument::load(&output, options()).unwrap();
    let before = MissionDocument::from_text(&recipient_text(), options()).unwrap();
    assert_eq!(result.ids().len(IdKind::Group), before.ids().len(IdKind::Group) + 2);
    assert_eq!(result.ids().len(IdKind::Unit), before.ids().len(IdKind::Unit) + 2);

    for name in ["Alpha", "Stingray 1", "Stingray 2"] {
        assert_eq!(result.index().country_of(name), Some("Germany"), "{name}");
    }
    let s1 = result.group("Stingray 1").unwrap();
    assert_ne!(schema::group_id(s1), Some(801));
    let s1_unit = schema::unit_tables(s1).next().and_then(schema::unit_id);
    assert_eq!(s1_unit, Some(merged[0].renamed_units[0].new));
    let s2 = result.group("Stingray 2").unwrap();
    assert_eq!(schema::unit_tables(s2).next().and_then(schema::unit_id), Some(902));

    let (groups, units) = collect_ids(result.tree());
    assert!(all_unique(&groups), "{groups:?}");
    assert!(all_unique(&units), "{units:?}");
}

#[test]
fn base_is_untouched_and_side_entries_survive() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_miz(dir.path(), "VGAF_base.miz", &recipient_text());
    let donor = write_miz(dir.path(), "VGAF_donor.miz", &donor_text());
    let output = dir.path().join("VGAF_out.miz");
    let base_bytes = std::fs::read(&base).unwrap();

    merge_missions(&base, &[donor], &output, &config()).unwrap();

    assert_eq!(std::fs::read(&base).unwrap(), base_bytes);
    assert_eq!(
        archive::entry_names(&output).unwrap(),
        vec!["mission", "options", "warehouses", "l10n/DEFAULT/dictionary"]
    );
    assert_eq!(
        archive::read_entry(&output, "options").unwrap(),
        b"options = { }"
    );
    let text = String::from_utf8(archive::read_entry(&output, "mission").unwrap()).unwrap();
    assert!(text.starts_with("mission = \n{\n"));
    assert!(text.trim_end().ends_with("-- end of mission"));
    assert!(text.contains("[\"sortie\"] = \"DictKey_sortie_5\","));
}

#[test]
fn rerunning_against_the_output_skips_everything() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_miz(dir.path(), "VGAF_base.miz", &recipient_text());
    let donor = write_miz(dir.path(), "VGAF_donor.miz", &donor_text());
    let first = dir.path().join("VGAF_first.miz");
    let second = dir.path().join("VGAF_second.miz");

    merge_missions(&base, &[donor.clone()], &first, &config()).unwrap();
    let report = merge_missions(&first, &[donor], &second, &config()).unwrap();
    assert_eq!(report.merged_count(), 0);
    assert_eq!(report.skipped_count(), 2);
    assert_eq!(report.group_ids, 3);
}

#[test]
fn missing_destination_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_miz(dir.path(), "VGAF_base.miz", &recipient_text());
    let donor = write_miz(
        dir.path(),
        "VGAF_donor.miz",
        &mission_text(&[("Norway", vec![GroupSpec::airborne("Stingray 1", 1, &[2])])]),
    );
    let output = dir.path().join("VGAF_out.miz");

    let err = merge_missions(&base, &[donor], &output, &config()).unwrap_err();
    assert!(matches!(
        err,
        RunError::Merge {
            source: MergeError::MissingDestination { .. },
            ..
        }
    ));
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn unreadable_donor_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_miz(dir.path(), "VGAF_base.miz", &recipient_text());
    let donor = dir.path().join("VGAF_broken.miz");
    std::fs::write(&donor, b"not a zip").unwrap();
    let output = dir.path().join("VGAF_out.miz");

    let err = merge_missions(&base, &[donor.clone()], &output, &config()).unwrap_err();
    assert!(matches!(err, RunError::Document { ref path, .. } if *path == donor));
    assert!(!output.exists());
}

// ---------------------------------------------------------------------------
// Document level
// ---------------------------------------------------------------------------

#[test]
fn no_op_merge_changes_nothing() {
    let mut recipient = MissionDocument::from_text(&recipient_text(), options()).unwrap();
    let mut donor = MissionDocument::from_text(
        &mission_text(&[("Germany", vec![GroupSpec::airborne("Alpha", 850, &[950])])]),
        options(),
    )
    .unwrap();
    let tree = recipient.tree().clone();
    let ids = recipient.ids().clone();
    let index = recipient.index().clone();

    let outcome = recipient.merge_group_from(&mut donor, "Alpha").unwrap();
    assert!(matches!(outcome, MergeOutcome::Skipped { .. }));
    assert_eq!(recipient.tree(), &tree);
    assert_eq!(recipient.ids(), &ids);
    assert_eq!(recipient.index(), &index);
}

#[test]
fn airborne_group_records_no_parking() {
    let mut recipient = MissionDocument::from_text(&recipient_text(), options()).unwrap();
    let mut donor = MissionDocument::from_text(&donor_text(), options()).unwrap();
    recipient.merge_group_from(&mut donor, "Stingray 2").unwrap();
    assert!(recipient.parking().is_empty());
    assert_eq!(recipient.ids().len(IdKind::Unit), 2);
}

#[test]
fn ground_start_collision_is_reported_but_merged() {
    let recipient_text = mission_text(&[(
        "Germany",
        vec![GroupSpec::airborne("Alpha", 801, &[901, 902]).parked(23, &["A1", "A2"])],
    )]);
    let donor_text = mission_text(&[(
        "Germany",
        vec![GroupSpec::airborne("Carver 1", 810, &[910, 911]).parked(23, &["A2", "B7"])],
    )]);
    let mut recipient = MissionDocument::from_text(&recipient_text, options()).unwrap();
    let mut donor = MissionDocument::from_text(&donor_text, options()).unwrap();
    assert_eq!(recipient.parking().occupied(), 2);

    let outcome = recipient.merge_group_from(&mut donor, "Carver 1").unwrap();
    let MergeOutcome::Merged(merged) = outcome else {
        panic!("not merged: {outcome:?}");
    };
    assert_eq!(merged.parking_conflicts, 1);
    assert!(merged.renamed_units.is_empty());
    let conflict = &recipient.parking().conflicts()[0];
    assert_eq!((conflict.airdrome, conflict.slot.as_str()), (23, "A2"));
    assert_eq!(conflict.previous.name, "Alpha-2");
    assert_eq!(conflict.current.name, "Carver 1-1");
    assert_eq!(recipient.parking().occupied(), 3);
}

#[test]
fn scan_counts_match_unique_ids() {
    let text = mission_text(&[
        (
            "Germany",
            vec![
                GroupSpec::airborne("A", 1, &[10, 11]),
                GroupSpec::airborne("B", 2, &[12]),
            ],
        ),
        ("USA", vec![GroupSpec::airborne("C", 3, &[13, 14, 15])]),
    ]);
    let doc = MissionDocument::from_text(&text, options()).unwrap();
    assert_eq!(doc.ids().len(IdKind::Group), doc.summary().groups);
    assert_eq!(doc.ids().len(IdKind::Unit), doc.summary().units);
    assert_eq!(doc.summary().units, 6);
    assert_eq!(doc.index().len(), 3);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn donor_groups() -> impl Strategy<Value = Vec<(i64, Vec<i64>)>> {
        prop::collection::vec(
            (800i64..=999, prop::collection::vec(800i64..=999, 1..4)),
            1..12,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_ids_stay_unique_after_merges(
            recipient_ids in prop::collection::btree_set(800i64..=999, 2..20),
            donor in donor_groups(),
            seed in any::<u64>(),
        ) {
            let ids: Vec<i64> = recipient_ids.iter().copied().collect();
            let (group_ids, unit_ids) = ids.split_at(1);
            let recipient_groups = [GroupSpec::airborne("Alpha", group_ids[0], unit_ids)];
            let donor_specs: Vec<GroupSpec> = donor
                .iter()
                .enumerate()
                .map(|(i, (gid, uids))| GroupSpec::airborne(&format!("Stingray {i}"), *gid, uids))
                .collect();

            let opts = DocumentOptions { seed: Some(seed), ..DocumentOptions::default() };
            let mut recipient = MissionDocument::from_text(
                &mission_text(&[("Germany", recipient_groups.to_vec())]),
                opts.clone(),
            ).unwrap();
            let mut donor_doc = MissionDocument::from_text(
                &mission_text(&[("Germany", donor_specs.clone())]),
                opts,
            ).unwrap();

            let variants = NameVariants {
                names: donor_specs.iter().map(|g| g.name.clone()).collect(),
                suffixes: vec![String::new()],
            };
            let report = merge_donor(&mut recipient, &mut donor_doc, &variants).unwrap();
            prop_assert_eq!(report.merged.len() + report.failed.len(), donor_specs.len());

            let (groups, units) = collect_ids(recipient.tree());
            prop_assert!(all_unique(&groups), "duplicate group ids: {:?}", groups);
            prop_assert!(all_unique(&units), "duplicate unit ids: {:?}", units);
            for id in &groups {
                prop_assert!(recipient.ids().contains(IdKind::Group, *id));
            }
            for id in &units {
                prop_assert!(recipient.ids().contains(IdKind::Unit, *id));
            }

            // every original recipient id is still there
            let kept: BTreeSet<i64> = units.iter().copied().collect();
            for id in unit_ids {
                prop_assert!(kept.contains(id));
            }
        }
    }
}
