//! Persisted workflow document through validation and resolution

#![recursion_limit = "256"]

use certflow_common::NodeId;
use certflow_workflow::{
    ResolveError, ValidatedGraph, Workflow, WorkflowError, WorkflowNode, WorkflowNodeType,
    OUTPUT_NAME_CERTIFICATE,
};
use serde_json::json;

fn persisted_workflow(certificate: &str) -> String {
    json!({
        "id": "wf-renew",
        "created": "2024-05-01 08:30:00.000Z",
        "updated": "2024-05-02 09:00:00.000Z",
        "name": "renew example.com",
        "description": "",
        "trigger": "auto",
        "triggerCron": "0 3 * * *",
        "enabled": true,
        "hasDraft": false,
        "lastRunId": "",
        "lastRunStatus": "",
        "lastRunTime": "0001-01-01T00:00:00Z",
        "draft": null,
        "content": {
            "id": "start",
            "type": "start",
            "name": "Start",
            "config": { "executionMethod": "auto", "crontab": "0 3 * * *" },
            "inputs": null,
            "outputs": null,
            "branches": null,
            "validated": false,
            "next": {
                "id": "apply-1",
                "type": "apply",
                "name": "Apply",
                "config": {
                    "domains": "example.com,www.example.com",
                    "contactEmail": "ops@example.com",
                    "provider": "tencentcloud",
                    "providerAccessId": "access-1",
                    "keyAlgorithm": "RSA2048"
                },
                "inputs": null,
                "outputs": [{
                    "label": "Certificate",
                    "name": "certificate",
                    "type": "certificate",
                    "required": true,
                    "value": null,
                    "valueSelector": { "id": "", "name": "" }
                }],
                "branches": null,
                "validated": false,
                "next": {
                    "id": "deploy-1",
                    "type": "deploy",
                    "name": "Deploy",
                    "config": {
                        "certificate": certificate,
                        "provider": "k8s-secret",
                        "providerAccessId": "access-2",
                        "providerConfig": { "namespace": "default" },
                        "skipOnLastSucceeded": true
                    },
                    "inputs": [{
                        "label": "Certificate",
                        "name": "certificate",
                        "type": "certificate",
                        "required": true,
                        "value": null,
                        "valueSelector": { "id": "apply-1", "name": "certificate" }
                    }],
                    "outputs": null,
                    "branches": null,
                    "validated": false,
                    "next": {
                        "id": "end",
                        "type": "end",
                        "name": "End",
                        "config": null,
                        "inputs": null,
                        "outputs": null,
                        "branches": null,
                        "validated": false,
                        "next": null
                    }
                }
            }
        }
    })
    .to_string()
}

#[test]
fn test_linear_chain_loads_and_resolves() {
    let workflow = Workflow::from_json(&persisted_workflow("apply-1#certificate")).unwrap();
    let graph = workflow.validated_content().unwrap();
    assert!(graph.nodes().all(|node| node.validated));

    let apply = graph.config("apply-1").and_then(|c| c.as_apply()).unwrap();
    assert_eq!(apply.skip_before_expiry_days, 30);
    assert_eq!(apply.provider.canonical().as_str(), "tencentcloud-dns");

    let mut ctx = certflow_workflow::ExecutionContext::new(&graph);
    ctx.record_output(&NodeId::new("apply-1"), OUTPUT_NAME_CERTIFICATE, "certificate-record-1")
        .unwrap();

    assert_eq!(ctx.deploy_certificate("deploy-1").unwrap(), "certificate-record-1");
    assert_eq!(
        ctx.resolve_input("deploy-1", "certificate").unwrap().unwrap(),
        "certificate-record-1"
    );
}

#[test]
fn test_dangling_reference_decodes_but_fails_to_resolve() {
    let workflow = Workflow::from_json(&persisted_workflow("apply-9#certificate")).unwrap();
    let graph = workflow.validated_content().unwrap();

    let deploy = graph.config("deploy-1").and_then(|c| c.as_deploy()).unwrap();
    assert_eq!(deploy.certificate.as_ref().map(|r| r.node_id().as_str()), Some("apply-9"));

    let ctx = certflow_workflow::ExecutionContext::new(&graph);
    assert_eq!(
        ctx.deploy_certificate("deploy-1").unwrap_err(),
        ResolveError::UnknownNode(NodeId::new("apply-9"))
    );
}

#[test]
fn test_malformed_reference_rejected_at_load() {
    let workflow = Workflow::from_json(&persisted_workflow("apply-1")).unwrap();
    let err = workflow.validated_content().unwrap_err();

    match err {
        WorkflowError::InvalidGraph { errors } => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].node_id, Some(NodeId::new("deploy-1")));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_workflow_without_content() {
    let workflow = Workflow::default();
    assert!(matches!(
        workflow.validated_content(),
        Err(WorkflowError::MissingGraph("published"))
    ));
}

#[test]
fn test_validated_graph_round_trips_to_json() {
    let tree = WorkflowNode::new("start", WorkflowNodeType::Start)
        .with_next(WorkflowNode::new("end", WorkflowNodeType::End));
    let graph = ValidatedGraph::new(tree).unwrap();

    let encoded = serde_json::to_value(graph.root()).unwrap();
    assert_eq!(encoded["validated"], true);
    assert_eq!(encoded["next"]["type"], "end");
    assert_eq!(encoded["branches"], serde_json::Value::Null);
}
