//! Integration tests for the widget output protocol, including
//! storage-backed elements against a real SQLite repository.

use proptest::prelude::*;
use widget_deck::protocol::{
    persist, FieldValue, GraphKind, InlineElement, ProgressStyle, StatusLevel, PLACEHOLDER,
};
use widget_deck::storage::{SampleValue, SeriesKey};
use widget_deck::{ProtocolParser, SqliteRepository, TimeSeriesRepository};

fn parse(raw: &str) -> widget_deck::WidgetDocument {
    ProtocolParser::new().parse(raw, None, None)
}

fn progress_value(row: &widget_deck::protocol::RenderRow) -> Option<f64> {
    match &row.element {
        Some(InlineElement::Progress(p)) => Some(p.value),
        _ => None,
    }
}

#[test]
fn title_refresh_status_and_clamped_progress() {
    let doc = parse("title: CPU\nrefresh: 2\nrow: [status:ok] CPU: 10%\nrow: [progress:150]");

    assert_eq!(doc.title.as_deref(), Some("CPU"));
    assert_eq!(doc.refresh, Some(2));
    assert_eq!(doc.rows.len(), 2);
    assert_eq!(doc.rows[0].status, Some(StatusLevel::Ok));
    assert_eq!(doc.rows[0].text, "CPU: 10%");
    assert_eq!(progress_value(&doc.rows[1]), Some(100.0));
}

#[test]
fn action_with_all_flags() {
    let doc = parse("action: [danger,sudo,timeout=30] Restart:systemctl restart foo");

    assert_eq!(doc.actions.len(), 1);
    let action = &doc.actions[0];
    assert_eq!(action.label, "Restart");
    assert_eq!(action.command, "systemctl restart foo");
    assert!(action.flags.danger);
    assert!(action.flags.sudo);
    assert!(!action.flags.refresh);
    assert_eq!(action.timeout, Some(30));
}

#[test]
fn datastore_line_with_tag_and_timestamp() {
    let doc = parse("datastore: cpu,core=0 value=75.5 1700000000");

    assert_eq!(doc.store.len(), 1);
    let directive = &doc.store[0];
    assert_eq!(directive.measurement, "cpu");
    assert_eq!(directive.tags.get("core").map(String::as_str), Some("0"));
    assert_eq!(directive.fields.get("value"), Some(&FieldValue::Float(75.5)));
    assert_eq!(directive.timestamp, Some(1_700_000_000));
    assert!(doc.warnings.is_empty());
}

#[test]
fn malformed_datastore_line_is_dropped_with_warning() {
    let mut parser = ProtocolParser::new();
    let doc = parser.parse("datastore: bad_line_no_fields", None, None);

    assert!(doc.store.is_empty());
    assert_eq!(parser.soft_warnings().len(), 1);
    assert!(parser.soft_warnings()[0].contains("bad_line_no_fields"));
    assert_eq!(doc.warnings, parser.soft_warnings());
}

#[test]
fn malformed_display_directives_are_silent() {
    let mut parser = ProtocolParser::new();
    let doc = parser.parse("action: no separator\nrefresh: soon\nbogus: line", None, None);

    assert!(doc.actions.is_empty());
    assert_eq!(doc.refresh, None);
    assert!(parser.soft_warnings().is_empty());
}

#[test]
fn bracketed_process_names_are_escaped() {
    let doc = parse("row: [kworker/0:1] \x1b[31mhot\x1b[0m [bold]load[/]");

    assert_eq!(doc.rows[0].text, "[[kworker/0:1]] hot [bold]load[/]");
    assert!(!doc.rows[0].literal);
}

#[test]
fn unsanitizable_row_still_renders_literally() {
    let doc = parse("row: stray [/] close");

    assert_eq!(doc.rows.len(), 1);
    assert!(doc.rows[0].literal);
    assert_eq!(doc.rows[0].text, "stray [/] close");
}

#[test]
fn progress_style_keyword_wins_over_gradient() {
    let doc = parse("row: [progress:40:fire:inline]");
    match &doc.rows[0].element {
        Some(InlineElement::Progress(p)) => {
            assert_eq!(p.style, ProgressStyle::Inline);
            assert!(p.paint.is_some());
        }
        other => panic!("expected progress, got {:?}", other),
    }
}

#[test]
fn table_keeps_its_position_between_rows() {
    let doc = parse(
        "row: Mounts\n[table:Mount|Use]\n[tablerow:/|[miniprogress:50:4]]\n[tablerow:/home]\nrow: done",
    );

    assert_eq!(doc.rows.len(), 3);
    assert_eq!(doc.rows[0].text, "Mounts");
    match &doc.rows[1].element {
        Some(InlineElement::Table(table)) => {
            assert_eq!(table.headers, vec!["Mount", "Use"]);
            assert_eq!(table.rows[0], vec!["/".to_string(), "██░░".to_string()]);
            assert_eq!(table.rows[1].len(), 2);
        }
        other => panic!("expected table, got {:?}", other),
    }
    assert_eq!(doc.rows[2].text, "done");
}

#[test]
fn unterminated_table_is_flushed_at_end() {
    let doc = parse("[table:A|B]\n[tablerow:1|2]");
    assert!(matches!(doc.rows[0].element, Some(InlineElement::Table(_))));
}

#[test]
fn storage_elements_without_repository_degrade() {
    let doc = parse("row: Avg [datafetch:cpu.usage:avg:1h]\nrow: [history_sparkline:cpu.usage:1h]");

    assert_eq!(doc.rows[0].text, format!("Avg {}", PLACEHOLDER));
    match &doc.rows[1].element {
        Some(InlineElement::Sparkline(s)) => assert!(s.values.is_empty()),
        other => panic!("expected sparkline, got {:?}", other),
    }
}

fn seeded_repository() -> SqliteRepository {
    let repo = SqliteRepository::open_in_memory().expect("in-memory database");
    let now = chrono::Utc::now().timestamp();
    let key = SeriesKey::new("cpu", "usage").with_tag("core", "0");
    for (offset, value) in [(30, 10.0), (20, 20.0), (10, 60.0)] {
        repo.insert(Some("cpu"), &key, now - offset, &SampleValue::Number(value))
            .unwrap();
    }
    // Same series in another widget's scope must not leak in
    repo.insert(Some("other"), &key, now, &SampleValue::Number(999.0))
        .unwrap();
    repo
}

#[test]
fn datafetch_resolves_against_scope() {
    let repo = seeded_repository();
    let raw = "row: now [datafetch:cpu.usage,core=0]\n\
               row: avg [datafetch:cpu.usage,core=0:avg:1h]\n\
               row: sum [datafetch:cpu.usage,core=0:sum:1h]\n\
               row: n [datafetch:cpu.usage,core=0:count:last_2]";

    let doc = ProtocolParser::new().parse(raw, Some(&repo), Some("cpu"));

    assert_eq!(doc.rows[0].text, "now 60.0");
    assert_eq!(doc.rows[1].text, "avg 30.0");
    assert_eq!(doc.rows[2].text, "sum 90.0");
    assert_eq!(doc.rows[3].text, "n 2.0");
}

#[test]
fn datafetch_aggregate_without_range_is_placeholder() {
    let repo = seeded_repository();
    let doc = ProtocolParser::new().parse(
        "row: [datafetch:cpu.usage,core=0:max]",
        Some(&repo),
        Some("cpu"),
    );
    assert_eq!(doc.rows[0].text, PLACEHOLDER);
}

#[test]
fn history_elements_read_series_oldest_first() {
    let repo = seeded_repository();
    let doc = ProtocolParser::new().parse(
        "row: [history_line:cpu.usage,core=0:1h:green:Load]",
        Some(&repo),
        Some("cpu"),
    );

    match &doc.rows[0].element {
        Some(InlineElement::Graph(graph)) => {
            assert_eq!(graph.kind, GraphKind::Line);
            assert_eq!(graph.values, vec![10.0, 20.0, 60.0]);
            assert_eq!(graph.label.as_deref(), Some("Load"));
            assert_eq!(graph.source.as_deref(), Some("cpu.usage,core=0"));
        }
        other => panic!("expected graph, got {:?}", other),
    }
}

#[test]
fn parsing_does_not_write_but_persist_does() {
    let repo = SqliteRepository::open_in_memory().unwrap();
    let key = SeriesKey::new("mem", "used");

    let doc = ProtocolParser::new().parse("datastore: mem used=41.5,swap=true", Some(&repo), Some("mem"));
    assert_eq!(repo.latest(Some("mem"), &key).unwrap(), None);

    let written = persist(&doc.store, &repo, Some("mem"), chrono::Utc::now().timestamp()).unwrap();
    assert_eq!(written, 2);
    assert_eq!(repo.latest(Some("mem"), &key).unwrap(), Some(41.5));
    assert_eq!(
        repo.latest(Some("mem"), &SeriesKey::new("mem", "swap")).unwrap(),
        Some(1.0)
    );
}

proptest! {
    #[test]
    fn progress_is_always_clamped(v in any::<i64>()) {
        let doc = parse(&format!("row: [progress:{}]", v));
        let value = progress_value(&doc.rows[0]).expect("progress element");
        prop_assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn mini_progress_width_is_always_bounded(w in any::<i32>()) {
        let doc = parse(&format!("row: [miniprogress:50:{}]", w));
        match &doc.rows[0].element {
            Some(InlineElement::MiniProgress(m)) => {
                prop_assert!((3..=20).contains(&m.width));
            }
            other => prop_assert!(false, "expected mini progress, got {:?}", other),
        }
    }

    #[test]
    fn parsing_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut parser = ProtocolParser::new();
        let doc = parser.parse_bytes(&bytes, None, None);
        prop_assert_eq!(&doc.warnings, &parser.soft_warnings().to_vec());
    }

    #[test]
    fn parsing_directive_soup_never_panics(
        lines in prop::collection::vec(
            prop_oneof![
                Just("row: ".to_string()),
                Just("[table:".to_string()),
                Just("[tablerow:a|b]".to_string()),
                Just("action: [".to_string()),
                Just("datastore: x y".to_string()),
                "row: \\[[a-z_]{1,12}:[-0-9.,:a-z]{0,20}\\]",
                ".{0,40}",
            ],
            0..30,
        )
    ) {
        let doc = parse(&lines.join("\n"));
        for row in &doc.rows {
            if let Some(value) = progress_value(row) {
                prop_assert!((0.0..=100.0).contains(&value));
            }
        }
    }
}
