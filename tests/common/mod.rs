//! Shared fixtures for miz-merge integration tests.
//!
//! Missions are written as text in the editor's layout and packed into real
//! `.miz` archives inside temp directories. No test touches a real missions
//! folder.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use mizmerge::tree::{Key, Value};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// A unit in a fixture group.
#[derive(Clone, Debug)]
pub struct UnitSpec {
    pub name: String,
    pub unit_id: i64,
    pub parking: Option<String>,
}

/// A plane group in a fixture mission.
#[derive(Clone, Debug)]
pub struct GroupSpec {
    pub name: String,
    pub group_id: i64,
    /// Airdrome of the first route point; `None` for airborne starts.
    pub airdrome: Option<i64>,
    pub units: Vec<UnitSpec>,
}

impl GroupSpec {
    /// An airborne group with one unit per id, named `"<name>-<n>"`.
    pub fn airborne(name: &str, group_id: i64, unit_ids: &[i64]) -> Self {
        Self {
            name: name.to_owned(),
            group_id,
            airdrome: None,
            units: unit_ids
                .iter()
                .enumerate()
                .map(|(i, id)| UnitSpec {
                    name: format!("{name}-{}", i + 1),
                    unit_id: *id,
                    parking: None,
                })
                .collect(),
        }
    }

    /// Start on the ground at `airdrome`, unit `n` on slot `slots[n]`.
    pub fn parked(mut self, airdrome: i64, slots: &[&str]) -> Self {
        self.airdrome = Some(airdrome);
        for (unit, slot) in self.units.iter_mut().zip(slots) {
            unit.parking = Some((*slot).to_owned());
        }
        self
    }
}

fn write_group(out: &mut String, key: usize, group: &GroupSpec) {
    let _ = writeln!(out, "\t\t\t\t\t\t[{key}] = ");
    out.push_str("\t\t\t\t\t\t{\n");
    let _ = writeln!(out, "\t\t\t\t\t\t\t[\"name\"] = \"{}\",", group.name);
    let _ = writeln!(out, "\t\t\t\t\t\t\t[\"groupId\"] = {},", group.group_id);
    out.push_str("\t\t\t\t\t\t\t[\"route\"] = { [\"points\"] = { [1] = { ");
    match group.airdrome {
        Some(id) => {
            let _ = write!(out, "[\"type\"] = \"TakeOffParking\", [\"airdromeId\"] = {id}, ");
        }
        None => out.push_str("[\"type\"] = \"Turning Point\", [\"alt\"] = 2000, "),
    }
    out.push_str("}, }, },\n");
    out.push_str("\t\t\t\t\t\t\t[\"units\"] = {\n");
    for (i, unit) in group.units.iter().enumerate() {
        let _ = write!(
            out,
            "\t\t\t\t\t\t\t\t[{}] = {{ [\"name\"] = \"{}\", [\"unitId\"] = {}, [\"type\"] = \"FA-18C_hornet\", ",
            i + 1,
            unit.name,
            unit.unit_id
        );
        if let Some(slot) = &unit.parking {
            let _ = write!(out, "[\"parking_id\"] = \"{slot}\", ");
        }
        out.push_str("},\n");
    }
    out.push_str("\t\t\t\t\t\t\t},\n");
    out.push_str("\t\t\t\t\t\t},\n");
}

/// Mission text with one blue country per entry, each holding plane groups.
pub fn mission_text(countries: &[(&str, Vec<GroupSpec>)]) -> String {
    let mut out = String::from("mission = \n{\n\t[\"coalition\"] = \n\t{\n");
    out.push_str("\t\t[\"blue\"] = \n\t\t{\n\t\t\t[\"name\"] = \"blue\",\n\t\t\t[\"country\"] = \n\t\t\t{\n");
    for (i, (name, groups)) in countries.iter().enumerate() {
        let _ = writeln!(out, "\t\t\t\t[{}] = {{", i + 1);
        let _ = writeln!(out, "\t\t\t\t\t[\"name\"] = \"{name}\",");
        let _ = writeln!(out, "\t\t\t\t\t[\"id\"] = {},", i + 2);
        if !groups.is_empty() {
            out.push_str("\t\t\t\t\t[\"plane\"] = { [\"group\"] = {\n");
            for (j, group) in groups.iter().enumerate() {
                write_group(&mut out, j + 1, group);
            }
            out.push_str("\t\t\t\t\t}, },\n");
        }
        out.push_str("\t\t\t\t},\n");
    }
    out.push_str("\t\t\t},\n\t\t},\n");
    out.push_str("\t\t[\"red\"] = { [\"name\"] = \"red\", [\"country\"] = { } },\n");
    out.push_str("\t},\n\t[\"sortie\"] = \"DictKey_sortie_5\",\n\t[\"version\"] = 21,\n} -- end of mission\n");
    out
}

/// Write a `.miz` with the given mission text plus the usual side entries.
pub fn write_miz(dir: &Path, file_name: &str, mission: &str) -> PathBuf {
    let path = dir.join(file_name);
    let mut zip = ZipWriter::new(File::create(&path).expect("create miz"));
    let opts = SimpleFileOptions::default();
    for (name, data) in [
        ("mission", mission.as_bytes()),
        ("options", b"options = { }".as_slice()),
        ("warehouses", b"warehouses = { }".as_slice()),
        ("l10n/DEFAULT/dictionary", b"dictionary = { }".as_slice()),
    ] {
        zip.start_file(name, opts).expect("start entry");
        zip.write_all(data).expect("write entry");
    }
    zip.finish().expect("finish miz");
    path
}

/// Every `groupId` and `unitId` anywhere in a tree, in walk order.
pub fn collect_ids(tree: &Value) -> (Vec<i64>, Vec<i64>) {
    fn walk(value: &Value, groups: &mut Vec<i64>, units: &mut Vec<i64>) {
        let Value::Table(table) = value else {
            return;
        };
        for (key, child) in table.iter() {
            match (key, child.as_int()) {
                (Key::Str(k), Some(id)) if k == "groupId" => groups.push(id),
                (Key::Str(k), Some(id)) if k == "unitId" => units.push(id),
                _ => walk(child, groups, units),
            }
        }
    }
    let mut groups = Vec::new();
    let mut units = Vec::new();
    walk(tree, &mut groups, &mut units);
    (groups, units)
}

/// `true` if no value appears twice.
pub fn all_unique(ids: &[i64]) -> bool {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).all(|w| w[0] != w[1])
}
