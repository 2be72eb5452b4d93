//! Typed extractors for the response shapes the pipeline consumes

use crate::node::{display_name, RawNode};
use crate::search::{as_list, find_all, find_first, indexed_collection, merge_node, unwrap_singleton};
use crate::types::{CanonicalRecord, EntityType, StandingsRow, StatPair, StatSheet};
use std::str::FromStr;
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Extract every `entity_type` record from a listing, roster or single-entity response
///
/// Collections (`players`, `teams`) are searched first. When the tree holds no
/// collection, the first bare record (`player`, `team`) is used instead. Entries
/// that merge to no fields are skipped with a warning.
pub fn extract_entities(tree: &RawNode, entity_type: EntityType) -> Vec<CanonicalRecord> {
    let mut records = Vec::new();
    let collections = find_all(tree, entity_type.collection_field());

    for collection in &collections {
        for entry in indexed_collection(collection) {
            if let Some(record) = extract_record(entry, entity_type) {
                records.push(record);
            }
        }
    }

    if collections.is_empty() {
        if let Some(body) = find_first(tree, entity_type.record_field()) {
            records.extend(record_from_body(body, entity_type));
        }
    }

    debug!("Extracted {} {} records", records.len(), entity_type);
    records
}

/// Number of `entity_type` entries the response carries, parsable or not
///
/// Counts collection entries before extraction, so a listing page holding a
/// malformed entry still reports its full size.
pub fn count_entries(tree: &RawNode, entity_type: EntityType) -> usize {
    find_all(tree, entity_type.collection_field())
        .into_iter()
        .map(|collection| indexed_collection(collection).len())
        .sum()
}

fn extract_record(entry: &RawNode, entity_type: EntityType) -> Option<CanonicalRecord> {
    // Entries are usually {"player": [...]}, but some endpoints hand back the body directly
    let body = entry.get(entity_type.record_field()).unwrap_or(entry);
    record_from_body(body, entity_type)
}

fn record_from_body(body: &RawNode, entity_type: EntityType) -> Option<CanonicalRecord> {
    let fields = merge_node(unwrap_singleton(body));
    if fields.is_empty() {
        warn!("Unrecognized {} shape, no fields extracted", entity_type);
        return None;
    }
    Some(CanonicalRecord::new(entity_type, fields))
}

/// Extract the stat pairs of a per-entity, per-date stat response
///
/// A response without any stats node (the scoring period has not closed)
/// yields an empty sheet. Values wrapped as `{"value": ..}` or
/// `{"display_value": ..}` are unwrapped. Items without a `stat_id` are skipped.
pub fn extract_stat_sheet(tree: &RawNode) -> StatSheet {
    let display_name = find_first(tree, "name").and_then(display_name);
    let scope = find_first(tree, "player_stats")
        .or_else(|| find_first(tree, "team_stats"))
        .unwrap_or(tree);

    let coverage = scope
        .get("coverage_type")
        .or_else(|| find_first(scope, "coverage_type"))
        .and_then(RawNode::as_text);
    let period = ["date", "week", "season"]
        .iter()
        .find_map(|field| scope.get(field).and_then(RawNode::as_text));

    let Some(stats_node) = find_first(scope, "stats") else {
        debug!("No stats node in response (period not closed)");
        return StatSheet { display_name, coverage, period, stats: Vec::new() };
    };

    let items: Vec<&RawNode> = match stats_node {
        RawNode::Map(_) => match stats_node.get("stat") {
            Some(stat) => as_list(stat),
            None => {
                let indexed = indexed_collection(stats_node);
                if indexed.is_empty() {
                    vec![stats_node]
                } else {
                    indexed
                }
            }
        },
        RawNode::List(items) => items.iter().collect(),
        RawNode::Scalar(_) => {
            warn!("Stats node is a scalar, no stats extracted");
            Vec::new()
        }
    };

    let stats = items.into_iter().filter_map(stat_pair).collect();
    StatSheet { display_name, coverage, period, stats }
}

fn stat_pair(item: &RawNode) -> Option<StatPair> {
    let stat = item.get("stat").unwrap_or(item);
    let stat_id = find_first(stat, "stat_id").and_then(RawNode::as_text)?;
    let raw_value = find_first(stat, "value").and_then(|value| match value {
        RawNode::Map(_) => value
            .get("value")
            .and_then(RawNode::as_text)
            .or_else(|| value.get("display_value").and_then(RawNode::as_text)),
        leaf => leaf.as_text(),
    });
    Some(StatPair { stat_id: stat_id.trim().to_string(), raw_value })
}

/// Extract the per-team lines of a league standings response
///
/// Teams are looked up under the `standings` node, falling back to the whole
/// tree. Entries without a `team_key` are skipped; outcome fields that are
/// missing or not numbers are left empty.
pub fn extract_standings(tree: &RawNode) -> Vec<StandingsRow> {
    let scope = find_first(tree, "standings").unwrap_or(tree);
    extract_entities(scope, EntityType::Team)
        .into_iter()
        .filter_map(|record| {
            let Some(team_key) = record.text(EntityType::Team.native_key_field()) else {
                warn!("Standings entry without a team_key, skipping");
                return None;
            };
            let standings = record.fields.get("team_standings");
            let outcome = standings.and_then(|node| find_first(node, "outcome_totals"));

            Some(StandingsRow {
                team_key,
                team_name: record.display_name(),
                wins: parsed(outcome, "wins"),
                losses: parsed(outcome, "losses"),
                ties: parsed(outcome, "ties"),
                win_pct: parsed(outcome, "percentage"),
                rank: parsed(standings, "rank"),
            })
        })
        .collect()
}

fn parsed<T: FromStr>(node: Option<&RawNode>, field: &str) -> Option<T> {
    let text = find_first(node?, field).and_then(RawNode::as_text)?;
    text.trim().parse().ok()
}

/// League `current_date`, if the response carries a valid ISO date
pub fn extract_current_date(tree: &RawNode) -> Option<NaiveDate> {
    let raw = find_first(tree, "current_date").and_then(RawNode::as_text)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn league_players_page() -> RawNode {
        RawNode::from(json!({
            "league": [
                {"league_key": "466.l.1234", "current_date": "2025-01-10"},
                {"players": {
                    "0": {"player": [[
                        {"player_key": "466.p.4912"},
                        {"player_id": "4912"},
                        {"name": {"full": "Jalen Brunson", "first": "Jalen", "last": "Brunson"}},
                        {"editorial_player_key": "nba.p.4912"},
                        [],
                        {"display_position": "PG"}
                    ]]},
                    "1": {"player": [[
                        {"player_key": "466.p.6014"},
                        {"name": {"full": "Mikal Bridges"}},
                        {"display_position": "SF"}
                    ]]},
                    "count": 2
                }}
            ]
        }))
    }

    #[test]
    fn test_extract_players_from_listing() {
        let records = extract_entities(&league_players_page(), EntityType::Player);
        assert_eq!(records.len(), 2);

        let brunson = &records[0];
        assert_eq!(brunson.text("player_key").as_deref(), Some("466.p.4912"));
        assert_eq!(brunson.text("player_id").as_deref(), Some("4912"));
        assert_eq!(brunson.text("editorial_player_key").as_deref(), Some("nba.p.4912"));
        assert_eq!(brunson.display_name().as_deref(), Some("Jalen Brunson"));
        assert_eq!(brunson.position().as_deref(), Some("PG"));

        assert_eq!(records[1].text("player_id"), None);
    }

    #[test]
    fn test_extract_roster_players_and_team() {
        let roster = RawNode::from(json!({
            "team": [
                [{"team_key": "466.l.1234.t.3"}, {"team_id": "3"}, {"name": "Bench Mob"}],
                {"roster": {"0": {"players": {
                    "0": {"player": [[
                        {"player_key": "466.p.5007"},
                        {"name": {"full": "Josh Hart"}}
                    ], {"selected_position": [{"coverage_type": "date"}, {"position": "G"}]}]},
                    "count": 1
                }}}}
            ]
        }));

        let players = extract_entities(&roster, EntityType::Player);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].text("player_key").as_deref(), Some("466.p.5007"));
        assert_eq!(players[0].position().as_deref(), Some("G"));

        let teams = extract_entities(&roster, EntityType::Team);
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].text("team_key").as_deref(), Some("466.l.1234.t.3"));
        assert_eq!(teams[0].display_name().as_deref(), Some("Bench Mob"));
    }

    #[test]
    fn test_unrecognized_entry_shape_degrades_to_no_record() {
        let tree = RawNode::from(json!({"players": {"0": {"player": "garbage"}, "1": {"player": [[{"player_key": "466.p.1"}]]}, "count": 2}}));
        let records = extract_entities(&tree, EntityType::Player);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("player_key").as_deref(), Some("466.p.1"));
    }

    #[test]
    fn test_count_entries_includes_malformed() {
        let tree = RawNode::from(json!({"league": [{"league_key": "466.l.1"}, {"players": {
            "0": {"player": [[{"player_key": "466.p.1"}]]},
            "1": {"player": "garbage"},
            "count": 2
        }}]}));
        assert_eq!(count_entries(&tree, EntityType::Player), 2);
        assert_eq!(extract_entities(&tree, EntityType::Player).len(), 1);

        let empty = RawNode::from(json!({"league": [{"league_key": "466.l.1"}, {"players": []}]}));
        assert_eq!(count_entries(&empty, EntityType::Player), 0);
    }

    #[test]
    fn test_extract_stat_sheet() {
        let response = RawNode::from(json!({
            "player": [
                [{"player_key": "466.p.4912"}, {"name": {"full": "Jalen Brunson"}}],
                {"player_stats": {
                    "coverage_type": "date",
                    "date": "2025-01-09",
                    "stats": [
                        {"stat": {"stat_id": "12", "value": "1012"}},
                        {"stat": {"stat_id": 15, "value": {"value": "301", "display_value": "301"}}},
                        {"stat": {"stat_id": "9004003", "value": "345/701"}},
                        {"stat": {"value": "7"}}
                    ]
                }}
            ]
        }));

        let sheet = extract_stat_sheet(&response);
        assert_eq!(sheet.display_name.as_deref(), Some("Jalen Brunson"));
        assert_eq!(sheet.coverage.as_deref(), Some("date"));
        assert_eq!(sheet.period.as_deref(), Some("2025-01-09"));
        assert_eq!(
            sheet.stats,
            vec![
                StatPair { stat_id: "12".into(), raw_value: Some("1012".into()) },
                StatPair { stat_id: "15".into(), raw_value: Some("301".into()) },
                StatPair { stat_id: "9004003".into(), raw_value: Some("345/701".into()) },
            ]
        );
    }

    #[test]
    fn test_stat_sheet_with_single_stat_map() {
        let response = RawNode::from(json!({"player_stats": {"stats": {"stat": {"stat_id": "5", "value": "3"}}}}));
        let sheet = extract_stat_sheet(&response);
        assert_eq!(sheet.stats.len(), 1);
        assert_eq!(sheet.stats[0].raw_value.as_deref(), Some("3"));
    }

    #[test]
    fn test_stat_sheet_without_stats_node_is_empty() {
        let response = RawNode::from(json!({
            "player": [[{"player_key": "466.p.4912"}, {"name": {"full": "Jalen Brunson"}}]]
        }));
        let sheet = extract_stat_sheet(&response);
        assert!(sheet.is_empty());
        assert_eq!(sheet.display_name.as_deref(), Some("Jalen Brunson"));
    }

    #[test]
    fn test_extract_standings() {
        let response = RawNode::from(json!({
            "league": [
                {"league_key": "466.l.1234"},
                {"standings": {"0": {"teams": {
                    "0": {"team": [
                        [{"team_key": "466.l.1234.t.3"}, {"team_id": "3"}, {"name": "Bench Mob"}],
                        {"team_standings": {
                            "rank": "1",
                            "outcome_totals": {"wins": "10", "losses": "6", "ties": 0, "percentage": ".625"}
                        }}
                    ]},
                    "1": {"team": [
                        [{"team_key": "466.l.1234.t.7"}, {"name": "Late Scratch"}],
                        {"team_standings": {"rank": "", "outcome_totals": {"wins": "0", "losses": "0", "ties": "0", "percentage": ""}}}
                    ]},
                    "2": {"team": [[{"name": "No Key"}]]},
                    "count": 3
                }}}}
            ]
        }));

        let rows = extract_standings(&response);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            StandingsRow {
                team_key: "466.l.1234.t.3".into(),
                team_name: Some("Bench Mob".into()),
                wins: Some(10),
                losses: Some(6),
                ties: Some(0),
                win_pct: Some(0.625),
                rank: Some(1),
            }
        );
        assert_eq!(rows[1].rank, None);
        assert_eq!(rows[1].win_pct, None);
        assert_eq!(rows[1].wins, Some(0));
    }

    #[test]
    fn test_extract_current_date() {
        assert_eq!(
            extract_current_date(&league_players_page()),
            NaiveDate::from_ymd_opt(2025, 1, 10)
        );
        assert_eq!(extract_current_date(&RawNode::from(json!({"current_date": "soon"}))), None);
    }
}
