use std::thread;

use crate::domain::{Mirror, MirrorId, Source};
use crate::error::PlanetError;
use crate::fetcher::{MetadataClient, parse_checksum};
use crate::listing::{extract_anchors, parse_listing};

pub fn load_all<C: MetadataClient>(client: &C, mirrors: &[Mirror]) -> Vec<Source> {
    let per_mirror = thread::scope(|scope| {
        let handles = mirrors
            .iter()
            .enumerate()
            .map(|(idx, mirror)| scope.spawn(move || load_mirror(client, MirrorId(idx), mirror)))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(PlanetError::Parse("mirror task panicked".to_string())))
            })
            .collect::<Vec<_>>()
    });

    let mut sources = Vec::new();
    for (mirror, outcome) in mirrors.iter().zip(per_mirror) {
        match outcome {
            Ok(found) => {
                tracing::debug!("{mirror}: {} source(s)", found.len());
                sources.extend(found);
            }
            Err(err) => tracing::warn!("failed to use {mirror}: {err}"),
        }
    }
    sources
}

pub fn load_mirror<C: MetadataClient>(
    client: &C,
    id: MirrorId,
    mirror: &Mirror,
) -> Result<Vec<Source>, PlanetError> {
    let html = client.fetch_text(&mirror.url)?;
    let mut sources = parse_listing(&mirror.url, id, extract_anchors(&html));
    if sources.is_empty() {
        return Err(PlanetError::Parse("no planet files found in listing".to_string()));
    }
    load_metadata(client, &mut sources);
    drop_redundant_latest(&mut sources);
    Ok(sources)
}

pub fn load_metadata<C: MetadataClient>(client: &C, sources: &mut [Source]) {
    let pending: &[Source] = sources;
    let loaded = thread::scope(|scope| {
        let handles = pending
            .iter()
            .map(|source| {
                let checksum = scope.spawn(move || load_checksum(client, source));
                let length = scope.spawn(move || load_length(client, source));
                (checksum, length)
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|(checksum, length)| {
                let checksum = checksum.join().unwrap_or_else(|_| {
                    tracing::warn!("checksum task panicked");
                    None
                });
                let length = length.join().unwrap_or_else(|_| {
                    tracing::warn!("content length task panicked");
                    None
                });
                (checksum, length)
            })
            .collect::<Vec<_>>()
    });

    for (source, (checksum, file_len)) in sources.iter_mut().zip(loaded) {
        source.checksum = checksum;
        source.file_len = file_len;
    }
}

fn load_checksum<C: MetadataClient>(client: &C, source: &Source) -> Option<String> {
    let url = source.checksum_url.as_deref()?;
    tracing::debug!("getting md5 checksum from {url}");
    match client.fetch_text(url) {
        Ok(body) => {
            let checksum = parse_checksum(&body);
            if checksum.is_none() {
                tracing::warn!("empty md5 checksum for {source}");
            }
            checksum
        }
        Err(err) => {
            tracing::warn!("unable to load md5 checksum for {source}: {err}");
            None
        }
    }
}

fn load_length<C: MetadataClient>(client: &C, source: &Source) -> Option<u64> {
    tracing::debug!("getting content length for {}", source.url);
    match client.fetch_length(&source.url) {
        Ok(len) => len,
        Err(err) => {
            tracing::warn!("unable to load metadata for {source}: {err}");
            None
        }
    }
}

fn drop_redundant_latest(sources: &mut Vec<Source>) {
    let redundant = match sources.as_slice() {
        [latest, newest, ..] => {
            latest.is_latest_alias()
                && !newest.is_latest_alias()
                && latest.checksum.is_some()
                && latest.checksum == newest.checksum
        }
        _ => false,
    };
    if redundant {
        sources.remove(0);
    }
}
