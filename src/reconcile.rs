use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Mirror, MirrorId, Source, format_date};
use crate::error::PlanetError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    pub force_latest: bool,
    pub include_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionSummary {
    pub date: Option<NaiveDate>,
    pub mirror_count: usize,
    pub checksum: String,
    pub file_len: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub checksum: String,
    pub date: Option<NaiveDate>,
    pub file_len: Option<u64>,
    pub urls: Vec<String>,
    pub sources: Vec<Source>,
    pub ranking: Vec<RevisionSummary>,
    pub skipped_newer: Option<RevisionSummary>,
    pub primary_excluded: bool,
}

pub fn reconcile(
    mirrors: &[Mirror],
    sources: Vec<Source>,
    options: ReconcileOptions,
) -> Result<Selection, PlanetError> {
    if sources.is_empty() {
        return Err(PlanetError::NoSources);
    }

    let mut groups: BTreeMap<String, Vec<Source>> = BTreeMap::new();
    let mut unchecked = Vec::new();
    for source in sources {
        match source.checksum.clone() {
            Some(checksum) => groups.entry(checksum).or_default().push(source),
            None => unchecked.push(source),
        }
    }

    let dates = date_to_checksum(&groups)?;
    if dates.is_empty() {
        return Err(PlanetError::Consistency(
            "no dated planet file with a checksum was found on any mirror".to_string(),
        ));
    }
    absorb_by_length(&mut groups, &dates, unchecked);

    for members in groups.values_mut() {
        members.sort_by_key(|s| {
            (
                s.timestamp.is_none(),
                s.timestamp,
                s.file_len.is_none(),
                s.file_len,
            )
        });
    }
    let ranking = rank(&groups);

    let top = &ranking[0];
    let (chosen, skipped_newer) = match ranking.get(1) {
        Some(second) if !options.force_latest && is_not_widespread(top, second) => {
            (second.clone(), Some(top.clone()))
        }
        _ => (top.clone(), None),
    };

    let mut members = groups.remove(&chosen.checksum).unwrap_or_default();
    let mut primary_excluded = false;
    if chosen.mirror_count > 2 && !options.include_primary {
        let preferred = members
            .iter()
            .filter(|s| !is_avoided(mirrors, s.mirror))
            .cloned()
            .collect::<Vec<_>>();
        if !preferred.is_empty() && preferred.len() < members.len() {
            members = preferred;
            primary_excluded = true;
        }
    }

    Ok(Selection {
        checksum: chosen.checksum.clone(),
        date: members.iter().find_map(|s| s.timestamp),
        file_len: members.iter().find_map(|s| s.file_len),
        urls: members.iter().map(|s| s.url.clone()).collect(),
        sources: members,
        ranking,
        skipped_newer,
        primary_excluded,
    })
}

/// `top` is too thin when the runner-up is on more than 1.5x as many mirrors.
pub fn is_not_widespread(top: &RevisionSummary, second: &RevisionSummary) -> bool {
    top.mirror_count * 3 < second.mirror_count * 2
}

fn is_avoided(mirrors: &[Mirror], id: MirrorId) -> bool {
    id.get(mirrors)
        .map(|mirror| mirror.avoid_by_default)
        .unwrap_or(false)
}

fn date_to_checksum(
    groups: &BTreeMap<String, Vec<Source>>,
) -> Result<BTreeMap<NaiveDate, String>, PlanetError> {
    let mut dates: BTreeMap<NaiveDate, String> = BTreeMap::new();
    for (checksum, members) in groups {
        for source in members {
            let Some(date) = source.timestamp else {
                continue;
            };
            match dates.get(&date) {
                None => {
                    dates.insert(date, checksum.clone());
                }
                Some(existing) if existing == checksum => {}
                Some(existing) => {
                    return Err(PlanetError::Consistency(format!(
                        "files dated {} have different checksums: {existing} and {checksum} ({source})",
                        format_date(Some(date))
                    )));
                }
            }
        }
    }
    Ok(dates)
}

fn absorb_by_length(
    groups: &mut BTreeMap<String, Vec<Source>>,
    dates: &BTreeMap<NaiveDate, String>,
    unchecked: Vec<Source>,
) {
    let mut lengths: BTreeMap<u64, BTreeSet<String>> = BTreeMap::new();
    for (checksum, members) in groups.iter() {
        for len in members.iter().filter_map(|s| s.file_len) {
            lengths.entry(len).or_default().insert(checksum.clone());
        }
    }

    for mut source in unchecked {
        let Some(len) = source.file_len else {
            tracing::warn!("ignoring {source}: no checksum and unknown file length");
            continue;
        };
        let candidates = lengths.get(&len);
        match candidates.map(|set| set.iter().collect::<Vec<_>>()).as_deref() {
            Some([checksum]) => {
                let checksum = (*checksum).clone();
                if let Some(expected) = source.timestamp.and_then(|date| dates.get(&date))
                    && *expected != checksum
                {
                    tracing::warn!(
                        "ignoring {source}: file length {len} matches {checksum}, but its date belongs to {expected}"
                    );
                    continue;
                }
                tracing::debug!("matched {source} to {checksum} by length {len}");
                source.checksum = Some(checksum.clone());
                groups.entry(checksum).or_default().push(source);
            }
            Some(many) if many.len() > 1 => {
                tracing::warn!(
                    "ignoring {source}: file length {len} matches {} different checksums",
                    many.len()
                );
            }
            _ => tracing::warn!("ignoring {source}: unrecognized file length {len}"),
        }
    }
}

fn rank(groups: &BTreeMap<String, Vec<Source>>) -> Vec<RevisionSummary> {
    let mut ranking = groups
        .iter()
        .map(|(checksum, members)| RevisionSummary {
            date: members.first().and_then(|s| s.timestamp),
            mirror_count: members.iter().map(|s| s.mirror).collect::<BTreeSet<_>>().len(),
            checksum: checksum.clone(),
            file_len: members.first().and_then(|s| s.file_len),
        })
        .collect::<Vec<_>>();
    // Undated groups compare as `None`, below every dated group.
    ranking.sort_by(|a, b| {
        (b.date, b.mirror_count, &b.checksum).cmp(&(a.date, a.mirror_count, &a.checksum))
    });
    ranking
}
