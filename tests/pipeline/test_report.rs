mod common;

use common::{clean_document, load, node, policy};
use flowmend::core::{Report, ValidationRegistry};
use serde_json::Value;

fn report_for(document: &Value) -> Report {
    let policy = policy();
    let pipeline = load(document, &policy);
    let findings = ValidationRegistry::new().run(&pipeline.graph, &policy);
    Report::build(&pipeline, &findings, &[])
}

#[test]
fn text_rendering_is_deterministic() {
    let report = report_for(&clean_document());
    assert_eq!(report.render_text(), report.render_text());
    assert_eq!(report.to_json(), report.to_json());
}

#[test]
fn node_array_order_does_not_affect_output() {
    let document = clean_document();
    let mut shuffled = document.clone();
    shuffled["nodes"].as_array_mut().unwrap().reverse();

    let original = report_for(&document);
    let reordered = report_for(&shuffled);
    assert_eq!(original.render_text(), reordered.render_text());
    assert_eq!(original.to_json(), reordered.to_json());
}

#[test]
fn stats_count_connectivity() {
    let mut document = clean_document();
    document["nodes"]
        .as_array_mut()
        .unwrap()
        .push(node("n11", "execute_checkout", "@n8n/n8n-nodes-langchain.toolCode"));
    let report = report_for(&document);

    assert_eq!(report.stats.total_nodes, 11);
    assert_eq!(report.stats.connected_nodes, 10);
    assert_eq!(report.stats.orphaned, 1);
    assert_eq!(report.stats.dead_ends, 0);
    assert!((report.stats.percent_connected - 90.9).abs() < 0.1);
}

#[test]
fn category_counts_cover_every_node() {
    let report = report_for(&clean_document());
    let counted: usize = report.categories.values().sum();
    assert_eq!(counted, report.stats.total_nodes);
    assert_eq!(report.categories.get("orchestrator"), Some(&2));
    assert_eq!(report.categories.get("entry"), Some(&1));
}

#[test]
fn node_detail_lists_edges_with_branch_positions() {
    let report = report_for(&clean_document());
    let conditional = report
        .nodes
        .iter()
        .find(|detail| detail.name == "IF: Known User?")
        .expect("conditional is listed");
    assert_eq!(
        conditional.outputs,
        vec!["Session Agent (main[0])", "Onboarding Agent (main[1])"]
    );
    assert_eq!(conditional.inputs, vec!["Extract Message (main)"]);

    let agent = report
        .nodes
        .iter()
        .find(|detail| detail.name == "Session Agent")
        .expect("agent is listed");
    assert!(agent
        .inputs
        .contains(&"OpenAI Chat Session (ai_languageModel)".to_string()));
    assert!(agent
        .inputs
        .contains(&"get_user_profile (ai_tool)".to_string()));
}

#[test]
fn text_report_names_sections() {
    let report = report_for(&clean_document());
    let text = report.render_text();
    assert!(text.starts_with("Pipeline integrity report"));
    assert!(text.contains("By category:"));
    assert!(text.contains("Findings (0):"));
    assert!(text.contains("Repair actions (0):"));
    assert!(text.contains("Node detail:"));
}
