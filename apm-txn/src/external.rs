//! External-call node termination (spec.md §4.6.2, component K).

use apm_segment::{ExternalAttributes, Segment, SegmentArena, SegmentId, TypedAttributes};
use apm_strings::StringPool;
use apm_time::{Duration, Timestamp};

use crate::valid_node_end;

/// A decoded cross-application response header (spec.md §6.3). The core
/// never parses the wire encoding itself.
#[derive(Clone, Debug)]
pub struct CatResponse {
    pub id: String,
    pub txnname: String,
    pub guid: Option<String>,
}

/// Strip `?query`, `#fragment`, and a leading `;params` segment, then
/// extract the `host[:port]` authority (spec.md §4.6.2 step 3). Returns
/// `None` if the result would be empty or pathologically long.
pub fn extract_domain(url: &str) -> Option<String> {
    const MAX_LEN: usize = 255;
    let cut = url
        .find(['?', '#', ';'])
        .map(|i| &url[..i])
        .unwrap_or(url);
    let without_scheme = cut.split("://").nth(1).unwrap_or(cut);
    let authority = without_scheme.split('/').next().unwrap_or("");
    if authority.is_empty() || authority.len() > MAX_LEN {
        return None;
    }
    Some(authority.to_string())
}

pub fn clean_url(url: &str) -> String {
    url.find(['?', '#']).map(|i| &url[..i]).unwrap_or(url).to_string()
}

#[allow(clippy::too_many_arguments)]
pub fn terminate_external(
    arena: &mut SegmentArena,
    strings: &mut StringPool,
    id: SegmentId,
    start: Timestamp,
    stop: Timestamp,
    url: &str,
    async_context: Option<apm_strings::StringId>,
    do_rollup: bool,
    cat: Option<CatResponse>,
    scoped_metrics: &mut apm_metrics::MetricTable,
    unscoped_metrics: &mut apm_metrics::MetricTable,
    root_kids_duration: &mut Duration,
    txn_start: Timestamp,
    recording: bool,
) -> bool {
    if !valid_node_end(recording, txn_start, start, stop) {
        tracing::debug!(target: "apm_txn", "dropping external node: invalid interval");
        return false;
    }
    if async_context.is_none() {
        *root_kids_duration = *root_kids_duration + stop.delta(start);
    }

    let domain = extract_domain(url).unwrap_or_else(|| {
        unscoped_metrics.add_timed(
            apm_metrics::SupportabilityCounter::OversizedUrl.metric_name(),
            Duration::ZERO,
            Duration::ZERO,
            true,
        );
        "<unknown>".to_string()
    });
    let duration = stop.delta(start);

    unscoped_metrics.add_timed("External/all", duration, duration, true);

    let scoped_name = if let Some(cat) = &cat {
        unscoped_metrics.add_timed(&format!("External/{domain}/all"), duration, duration, false);
        unscoped_metrics.add_timed(&format!("ExternalApp/{domain}/{}/all", cat.id), duration, duration, false);
        format!("ExternalTransaction/{domain}/{}/{}", cat.id, cat.txnname)
    } else {
        format!("External/{domain}/all")
    };
    scoped_metrics.add_timed(&scoped_name, duration, duration, false);

    if do_rollup {
        if let Some(last) = last_child(arena, id) {
            let mergeable = {
                let candidate = arena.get(last);
                candidate.name == strings.lookup(&scoped_name)
                    && candidate
                        .stop_time
                        .map(|prev_stop| start.stamp().is_immediately_after(prev_stop.stamp()))
                        .unwrap_or(false)
            };
            if mergeable {
                arena.get_mut(last).stop_time = Some(stop);
                return true;
            }
        }
    }

    let name_id = strings.intern(&scoped_name);
    arena.set_name(id, name_id);
    if let Some(ctx) = async_context {
        arena.get_mut(id).async_context = ctx;
    }
    let attrs = ExternalAttributes {
        uri: Some(clean_url(url)),
        transaction_guid: cat.and_then(|c| c.guid),
        library: None,
        procedure: None,
    };
    let segment: &mut Segment = arena.get_mut(id);
    segment.typed_attributes = TypedAttributes::External(Box::new(attrs));
    true
}

/// The most-recently-added sibling of `id`'s parent that isn't `id` itself,
/// used to find the rollup-merge candidate (spec.md §4.6.2 step 5).
fn last_child(arena: &SegmentArena, id: SegmentId) -> Option<SegmentId> {
    let parent = arena.get(id).parent()?;
    arena
        .get(parent)
        .children()
        .iter()
        .rev()
        .find(|child| **child != id)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use apm_time::Clock;

    #[test]
    fn domain_extraction_strips_query_and_scheme() {
        assert_eq!(
            extract_domain("https://api.example.com/v1/things?x=1"),
            Some("api.example.com".to_string())
        );
    }

    #[test]
    fn empty_authority_is_unknown() {
        assert_eq!(extract_domain("https:///path"), None);
    }

    #[test]
    fn cat_present_produces_external_transaction_name() {
        let mut clock = Clock::new();
        let txn_start = clock.tick(0);
        let mut arena = SegmentArena::new(txn_start);
        let seg = arena.start(clock.tick(1), None);
        let stop = clock.tick(1_000);
        arena.end(seg, stop);

        let mut strings = StringPool::new();
        let mut scoped = apm_metrics::MetricTable::new(100);
        let mut unscoped = apm_metrics::MetricTable::new(100);
        let mut root_kids = Duration::ZERO;

        let ok = terminate_external(
            &mut arena,
            &mut strings,
            seg,
            arena.get(seg).start_time,
            stop,
            "https://service.internal/api",
            None,
            false,
            Some(CatResponse {
                id: "12345#6789".to_string(),
                txnname: "WebTransaction/Uri/other".to_string(),
                guid: Some("abc123".to_string()),
            }),
            &mut scoped,
            &mut unscoped,
            &mut root_kids,
            txn_start,
            true,
        );
        assert!(ok);
        assert!(scoped
            .get("ExternalTransaction/service.internal/12345#6789/WebTransaction/Uri/other")
            .is_some());
    }

    #[test]
    fn no_cat_produces_plain_external_name() {
        let mut clock = Clock::new();
        let txn_start = clock.tick(0);
        let mut arena = SegmentArena::new(txn_start);
        let seg = arena.start(clock.tick(1), None);
        let stop = clock.tick(1_000);
        arena.end(seg, stop);

        let mut strings = StringPool::new();
        let mut scoped = apm_metrics::MetricTable::new(100);
        let mut unscoped = apm_metrics::MetricTable::new(100);
        let mut root_kids = Duration::ZERO;

        terminate_external(
            &mut arena,
            &mut strings,
            seg,
            arena.get(seg).start_time,
            stop,
            "https://service.internal/api",
            None,
            false,
            None,
            &mut scoped,
            &mut unscoped,
            &mut root_kids,
            txn_start,
            true,
        );
        assert!(scoped.get("External/service.internal/all").is_some());
    }
}
