mod common;

use common::{clean_document, link, load, main_link, node, policy};
use flowmend::core::{Finding, Severity, ValidationRegistry};
use serde_json::json;

fn run(document: &serde_json::Value) -> Vec<Finding> {
    let policy = policy();
    let pipeline = load(document, &policy);
    ValidationRegistry::new().run(&pipeline.graph, &policy)
}

#[test]
fn clean_pipeline_yields_no_findings() {
    let findings = run(&clean_document());
    assert!(
        findings.is_empty(),
        "expected clean verdict, got: {:?}",
        findings
    );
}

#[test]
fn conditional_with_single_branch_is_one_branch_error() {
    // Two-way conditional with only branch 0 populated.
    let document = json!({
        "nodes": [
            node("n1", "WhatsApp Trigger", "n8n-nodes-base.whatsAppTrigger"),
            node("n2", "IF: Known User?", "n8n-nodes-base.if"),
            node("n3", "Send Reply", "n8n-nodes-base.httpRequest")
        ],
        "connections": {
            "WhatsApp Trigger": {"main": [[main_link("IF: Known User?")]]},
            "IF: Known User?": {"main": [[main_link("Send Reply")]]}
        }
    });
    let findings = run(&document);
    let branch_errors: Vec<_> = findings
        .iter()
        .filter(|finding| finding.rule_id == "FM-VAL-006")
        .collect();
    assert_eq!(branch_errors.len(), 1);
    assert_eq!(branch_errors[0].severity, Severity::Error);
    assert_eq!(branch_errors[0].node.as_deref(), Some("IF: Known User?"));
}

#[test]
fn multi_way_switch_without_pinned_cardinality_is_clean() {
    // A 4-way switch routing session types; the fixture policy pins a
    // count for `.if` kinds only, so the switch keeps all its branches.
    let document = json!({
        "nodes": [
            node("n1", "WhatsApp Trigger", "n8n-nodes-base.whatsAppTrigger"),
            node("n2", "Switch: Session Type", "n8n-nodes-base.switch"),
            node("n3", "Handle Order", "n8n-nodes-base.code"),
            node("n4", "Handle Query", "n8n-nodes-base.code"),
            node("n5", "Handle Complaint", "n8n-nodes-base.code"),
            node("n6", "Handle Other", "n8n-nodes-base.code"),
            node("n7", "Send Reply", "n8n-nodes-base.httpRequest")
        ],
        "connections": {
            "WhatsApp Trigger": {"main": [[main_link("Switch: Session Type")]]},
            "Switch: Session Type": {"main": [
                [main_link("Handle Order")],
                [main_link("Handle Query")],
                [main_link("Handle Complaint")],
                [main_link("Handle Other")]
            ]},
            "Handle Order": {"main": [[main_link("Send Reply")]]},
            "Handle Query": {"main": [[main_link("Send Reply")]]},
            "Handle Complaint": {"main": [[main_link("Send Reply")]]},
            "Handle Other": {"main": [[main_link("Send Reply")]]}
        }
    });
    let findings = run(&document);
    assert!(
        findings.is_empty(),
        "expected clean verdict, got: {:?}",
        findings
    );
}

#[test]
fn pinned_cardinality_still_bounds_surplus_branches() {
    let document = json!({
        "nodes": [
            node("n1", "WhatsApp Trigger", "n8n-nodes-base.whatsAppTrigger"),
            node("n2", "IF: Known User?", "n8n-nodes-base.if"),
            node("n3", "Send Reply", "n8n-nodes-base.httpRequest")
        ],
        "connections": {
            "WhatsApp Trigger": {"main": [[main_link("IF: Known User?")]]},
            "IF: Known User?": {"main": [
                [main_link("Send Reply")],
                [main_link("Send Reply")],
                [main_link("Send Reply")]
            ]}
        }
    });
    let findings = run(&document);
    assert!(findings
        .iter()
        .any(|finding| finding.rule_id == "FM-VAL-006"
            && finding.is_error()
            && finding.detail.contains("allows 2")));
}

#[test]
fn orchestrator_without_language_model_is_attachment_error() {
    // Agent with a tool attached but no ai_languageModel link.
    let document = json!({
        "nodes": [
            node("n1", "WhatsApp Trigger", "n8n-nodes-base.whatsAppTrigger"),
            node("n2", "Session Agent", "@n8n/n8n-nodes-langchain.agent"),
            node("n3", "Send Reply", "n8n-nodes-base.httpRequest"),
            node("n4", "get_user_profile", "@n8n/n8n-nodes-langchain.toolCode")
        ],
        "connections": {
            "WhatsApp Trigger": {"main": [[main_link("Session Agent")]]},
            "Session Agent": {"main": [[main_link("Send Reply")]]},
            "get_user_profile": {"ai_tool": [[link("Session Agent", "ai_tool")]]}
        }
    });
    let findings = run(&document);
    let attachment_errors: Vec<_> = findings
        .iter()
        .filter(|finding| finding.rule_id == "FM-VAL-007")
        .collect();
    assert_eq!(attachment_errors.len(), 1);
    assert_eq!(attachment_errors[0].severity, Severity::Error);
    assert_eq!(attachment_errors[0].node.as_deref(), Some("Session Agent"));
}

#[test]
fn unattached_tool_is_orphan_error() {
    // Tool node with zero outgoing attachment edges.
    let mut document = clean_document();
    document["nodes"]
        .as_array_mut()
        .unwrap()
        .push(node("n11", "execute_checkout", "@n8n/n8n-nodes-langchain.toolCode"));
    let findings = run(&document);
    let orphans: Vec<_> = findings
        .iter()
        .filter(|finding| finding.rule_id == "FM-VAL-002")
        .collect();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].severity, Severity::Error);
    assert_eq!(orphans[0].node.as_deref(), Some("execute_checkout"));
}

#[test]
fn duplicate_entry_is_warning_not_error() {
    // A second trigger is a removal candidate, never deleted.
    let mut document = clean_document();
    document["nodes"]
        .as_array_mut()
        .unwrap()
        .push(node("n11", "Webhook WhatsApp", "n8n-nodes-base.webhook"));
    let findings = run(&document);
    let entry_findings: Vec<_> = findings
        .iter()
        .filter(|finding| finding.rule_id == "FM-VAL-001")
        .collect();
    assert_eq!(entry_findings.len(), 1);
    assert_eq!(entry_findings[0].severity, Severity::Warning);
    assert_eq!(entry_findings[0].node.as_deref(), Some("Webhook WhatsApp"));
    assert!(!entry_findings.iter().any(|finding| finding.is_error()));
}

#[test]
fn missing_entry_is_error() {
    let document = json!({
        "nodes": [
            node("n1", "Extract Message", "n8n-nodes-base.code"),
            node("n2", "Send Reply", "n8n-nodes-base.httpRequest")
        ],
        "connections": {
            "Extract Message": {"main": [[main_link("Send Reply")]]}
        }
    });
    let findings = run(&document);
    assert!(findings
        .iter()
        .any(|finding| finding.rule_id == "FM-VAL-001" && finding.is_error()));
}

#[test]
fn node_receiving_flow_without_sending_is_dead_end() {
    let document = json!({
        "nodes": [
            node("n1", "WhatsApp Trigger", "n8n-nodes-base.whatsAppTrigger"),
            node("n2", "Dedup Messages", "n8n-nodes-base.code"),
            node("n3", "Send Reply", "n8n-nodes-base.httpRequest")
        ],
        "connections": {
            "WhatsApp Trigger": {"main": [[main_link("Dedup Messages")]]}
        }
    });
    let findings = run(&document);
    assert!(findings
        .iter()
        .any(|finding| finding.rule_id == "FM-VAL-004"
            && finding.node.as_deref() == Some("Dedup Messages")));
    // The terminal is also unreached.
    assert!(findings
        .iter()
        .any(|finding| finding.rule_id == "FM-VAL-005"
            && finding.node.as_deref() == Some("Send Reply")));
}

#[test]
fn disconnected_main_path_node_is_unreachable() {
    let mut document = clean_document();
    document["nodes"]
        .as_array_mut()
        .unwrap()
        .push(node("n11", "Insert User", "n8n-nodes-base.supabase"));
    document["connections"]["Insert User"] =
        json!({"main": [[main_link("Send Reply")]]});
    let findings = run(&document);
    assert!(findings
        .iter()
        .any(|finding| finding.rule_id == "FM-VAL-005"
            && finding.node.as_deref() == Some("Insert User")
            && finding.is_error()));
}

#[test]
fn unknown_kind_defaults_to_config_with_warning() {
    let mut document = clean_document();
    document["nodes"]
        .as_array_mut()
        .unwrap()
        .push(node("n11", "Global Config", "vendor.mystery"));
    let findings = run(&document);
    let confidence: Vec<_> = findings
        .iter()
        .filter(|finding| finding.rule_id == "FM-VAL-003")
        .collect();
    assert_eq!(confidence.len(), 1);
    assert_eq!(confidence[0].severity, Severity::Warning);
    // A config node with zero connections is expected, not an orphan.
    assert!(!findings
        .iter()
        .any(|finding| finding.rule_id == "FM-VAL-002"
            && finding.node.as_deref() == Some("Global Config")));
}

#[test]
fn ai_family_kind_on_main_path_gets_type_tag_warning() {
    let mut document = clean_document();
    document["nodes"].as_array_mut().unwrap().push(node(
        "n11",
        "Insert User",
        "@n8n/n8n-nodes-langchain.supabase",
    ));
    document["connections"]["Onboarding Agent"] =
        json!({"main": [[main_link("Insert User")]]});
    document["connections"]["Insert User"] =
        json!({"main": [[main_link("Send Reply")]]});
    let findings = run(&document);
    let family: Vec<_> = findings
        .iter()
        .filter(|finding| finding.rule_id == "FM-VAL-008")
        .collect();
    assert_eq!(family.len(), 1);
    assert_eq!(family[0].severity, Severity::Warning);
    assert_eq!(family[0].node.as_deref(), Some("Insert User"));
}

#[test]
fn findings_are_stably_sorted() {
    let mut document = clean_document();
    {
        let nodes = document["nodes"].as_array_mut().unwrap();
        nodes.push(node("n11", "execute_checkout", "@n8n/n8n-nodes-langchain.toolCode"));
        nodes.push(node("n12", "Global Config", "vendor.mystery"));
        nodes.push(node("n13", "Webhook WhatsApp", "n8n-nodes-base.webhook"));
    }
    let findings = run(&document);
    assert!(findings.len() >= 3);
    for pair in findings.windows(2) {
        let severity_rank = |severity: Severity| match severity {
            Severity::Error => 2u8,
            Severity::Warning => 1,
        };
        let left = severity_rank(pair[0].severity);
        let right = severity_rank(pair[1].severity);
        assert!(left >= right, "severity sort order must be descending");
        if left == right {
            assert!(
                pair[0].rule_id <= pair[1].rule_id,
                "rule id sort order must be ascending within a severity"
            );
        }
    }
}
