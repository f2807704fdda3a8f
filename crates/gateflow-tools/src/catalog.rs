use crate::args::ArgReader;
use gateflow_assess::Findings;
use gateflow_core::{
    AgentRole, EventKind, GateflowError, GateflowResult, PassFail, ProjectKind, ProofType,
    SpawnStatus, SpecType, Task, TaskPriority, Worker, WorkerCategory,
};
use gateflow_enforce::{check_parallel_spawn_conflicts, AgentOwnership, SpawnCompletion};
use gateflow_orchestrator::WorkflowCoordinator;
use gateflow_proofs::ProofSubmission;
use gateflow_queue::TaskOutcome;
use gateflow_truth::EventFilter;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// A tool's catalog entry.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDef {
    /// Tool name, `<group>_<operation>`.
    pub name: &'static str,
    /// Catalog group.
    pub group: &'static str,
    /// What the tool does.
    pub description: &'static str,
    /// JSON schema of the input object.
    pub input_schema: Value,
}

/// The schema-validated JSON tool surface over the workflow core.
pub struct ToolCatalog {
    coordinator: Arc<WorkflowCoordinator>,
}

fn parse_wire_enum<T: DeserializeOwned>(raw: &str) -> Option<T> {
    serde_json::from_value(Value::String(raw.to_string())).ok()
}

impl ToolCatalog {
    /// Creates the catalog over the coordinator.
    pub fn new(coordinator: Arc<WorkflowCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Lists every tool with its schema.
    pub fn list(&self) -> Vec<ToolDef> {
        fn schema(required: &[&str], props: Value) -> Value {
            json!({"type": "object", "required": required, "properties": props})
        }
        vec![
            ToolDef {
                name: "project_create",
                group: "project",
                description: "Create a project (idempotent by id) and initialize its workflow",
                input_schema: schema(
                    &["project_id", "name", "owner"],
                    json!({
                        "project_id": {"type": "string"},
                        "name": {"type": "string"},
                        "owner": {"type": "string"},
                        "kind": {"type": "string", "enum": ["standard", "ai_ml"]},
                    }),
                ),
            },
            ToolDef {
                name: "state_get",
                group: "state",
                description: "Read the derived project snapshot",
                input_schema: schema(&["project_id"], json!({"project_id": {"type": "string"}})),
            },
            ToolDef {
                name: "state_events",
                group: "state",
                description: "Read the filtered event log, ordered by seq",
                input_schema: schema(
                    &["project_id"],
                    json!({
                        "project_id": {"type": "string"},
                        "event_types": {"type": "array", "items": {"type": "string"}},
                        "gate": {"type": "string"},
                        "task_id": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "state_stats",
                group: "state",
                description: "Event counts by type and actor",
                input_schema: schema(&["project_id"], json!({"project_id": {"type": "string"}})),
            },
            ToolDef {
                name: "gate_current",
                group: "gates",
                description: "The first non-approved gate",
                input_schema: schema(&["project_id"], json!({"project_id": {"type": "string"}})),
            },
            ToolDef {
                name: "gate_can_transition",
                group: "gates",
                description: "Check approval preconditions without changing state",
                input_schema: schema(
                    &["project_id", "gate", "actor"],
                    json!({
                        "project_id": {"type": "string"},
                        "gate": {"type": "string"},
                        "actor": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "gate_present",
                group: "gates",
                description: "Present a gate for review (requires completed agent spawns)",
                input_schema: schema(
                    &["project_id", "gate", "actor"],
                    json!({
                        "project_id": {"type": "string"},
                        "gate": {"type": "string"},
                        "actor": {"type": "string"},
                        "notes": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "gate_approve",
                group: "gates",
                description: "Approve a gate with an explicit approval phrase",
                input_schema: schema(
                    &["project_id", "gate", "actor", "approval_response"],
                    json!({
                        "project_id": {"type": "string"},
                        "gate": {"type": "string"},
                        "actor": {"type": "string"},
                        "approval_response": {"type": "string"},
                        "notes": {"type": "string"},
                        "force_without_proofs": {"type": "boolean"},
                    }),
                ),
            },
            ToolDef {
                name: "gate_reject",
                group: "gates",
                description: "Reject a gate with a blocking reason",
                input_schema: schema(
                    &["project_id", "gate", "actor", "blocking_reason"],
                    json!({
                        "project_id": {"type": "string"},
                        "gate": {"type": "string"},
                        "actor": {"type": "string"},
                        "blocking_reason": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "spec_register",
                group: "specs",
                description: "Register a machine-readable spec (fails once locked)",
                input_schema: schema(
                    &["project_id", "spec_type", "path", "checksum", "actor"],
                    json!({
                        "project_id": {"type": "string"},
                        "spec_type": {"type": "string", "enum": ["openapi", "prisma", "zod", "architecture"]},
                        "path": {"type": "string"},
                        "checksum": {"type": "string"},
                        "actor": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "spec_list",
                group: "specs",
                description: "List registered specs and lock state",
                input_schema: schema(&["project_id"], json!({"project_id": {"type": "string"}})),
            },
            ToolDef {
                name: "task_enqueue",
                group: "task",
                description: "Enqueue a task with priority, dependencies, and spec refs",
                input_schema: schema(
                    &["project_id", "task_type", "description", "worker_category"],
                    json!({
                        "project_id": {"type": "string"},
                        "task_type": {"type": "string"},
                        "description": {"type": "string"},
                        "worker_category": {"type": "string", "enum": ["planning", "generation", "validation"]},
                        "priority": {"type": "string", "enum": ["critical", "high", "medium", "low"]},
                        "depends_on": {"type": "array", "items": {"type": "string"}},
                        "gate_dependency": {"type": "string"},
                        "spec_refs": {"type": "array", "items": {"type": "string"}},
                    }),
                ),
            },
            ToolDef {
                name: "task_dequeue",
                group: "task",
                description: "Dequeue the next eligible task for a worker",
                input_schema: schema(
                    &["worker_id", "category"],
                    json!({
                        "worker_id": {"type": "string"},
                        "category": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "task_complete",
                group: "task",
                description: "Record a task outcome",
                input_schema: schema(
                    &["task_id", "worker_id", "outcome"],
                    json!({
                        "task_id": {"type": "string"},
                        "worker_id": {"type": "string"},
                        "outcome": {"type": "string", "enum": ["complete", "failed"]},
                        "output": {"type": "string"},
                        "error": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "task_retry",
                group: "task",
                description: "Requeue a failed task with promoted priority",
                input_schema: schema(&["task_id"], json!({"task_id": {"type": "string"}})),
            },
            ToolDef {
                name: "task_history",
                group: "task",
                description: "Events for one task",
                input_schema: schema(
                    &["project_id", "task_id"],
                    json!({
                        "project_id": {"type": "string"},
                        "task_id": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "worker_register",
                group: "workers",
                description: "Register a worker into a project's pool",
                input_schema: schema(
                    &["project_id", "category"],
                    json!({
                        "project_id": {"type": "string"},
                        "category": {"type": "string"},
                        "capabilities": {"type": "array", "items": {"type": "string"}},
                    }),
                ),
            },
            ToolDef {
                name: "worker_deregister",
                group: "workers",
                description: "Deregister a worker",
                input_schema: schema(&["worker_id"], json!({"worker_id": {"type": "string"}})),
            },
            ToolDef {
                name: "proof_submit",
                group: "proof-artifact",
                description: "Submit a proof artifact; the file is hashed at submission",
                input_schema: schema(
                    &["project_id", "gate", "proof_type", "file_path", "pass_fail", "created_by"],
                    json!({
                        "project_id": {"type": "string"},
                        "gate": {"type": "string"},
                        "proof_type": {"type": "string"},
                        "file_path": {"type": "string"},
                        "content_summary": {"type": "string"},
                        "pass_fail": {"type": "string", "enum": ["pass", "fail"]},
                        "created_by": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "proof_verify",
                group: "proof-artifact",
                description: "Recompute a proof's hash and compare to the stored one",
                input_schema: schema(
                    &["project_id", "artifact_id"],
                    json!({
                        "project_id": {"type": "string"},
                        "artifact_id": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "proof_gate_status",
                group: "proof-artifact",
                description: "Which required proof types a gate still lacks",
                input_schema: schema(
                    &["project_id", "gate"],
                    json!({
                        "project_id": {"type": "string"},
                        "gate": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "proof_report",
                group: "proof-artifact",
                description: "Markdown report of all proofs",
                input_schema: schema(&["project_id"], json!({"project_id": {"type": "string"}})),
            },
            ToolDef {
                name: "spawn_record",
                group: "agent-spawn",
                description: "Record an agent spawn before gate work begins",
                input_schema: schema(
                    &["project_id", "agent", "gate", "task_description"],
                    json!({
                        "project_id": {"type": "string"},
                        "agent": {"type": "string"},
                        "gate": {"type": "string"},
                        "task_description": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "spawn_complete",
                group: "agent-spawn",
                description: "Complete a spawn; immutable afterwards",
                input_schema: schema(
                    &["project_id", "spawn_id", "status"],
                    json!({
                        "project_id": {"type": "string"},
                        "spawn_id": {"type": "string"},
                        "status": {"type": "string", "enum": ["completed", "failed"]},
                        "result_summary": {"type": "string"},
                        "input_tokens": {"type": "number"},
                        "output_tokens": {"type": "number"},
                    }),
                ),
            },
            ToolDef {
                name: "spawn_validate_gate",
                group: "agent-spawn",
                description: "Whether the gate's required-agent contract is satisfied",
                input_schema: schema(
                    &["project_id", "gate"],
                    json!({
                        "project_id": {"type": "string"},
                        "gate": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "spawn_validate_before_work",
                group: "agent-spawn",
                description: "Pre-work hard-stop check for the orchestrator",
                input_schema: schema(
                    &["project_id", "gate", "intended_action"],
                    json!({
                        "project_id": {"type": "string"},
                        "gate": {"type": "string"},
                        "intended_action": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "spawn_check_parallel",
                group: "agent-spawn",
                description: "File-ownership conflict check for a parallel fan-out",
                input_schema: schema(
                    &["agents"],
                    json!({
                        "agents": {"type": "array", "items": {"type": "object", "properties": {
                            "agent_name": {"type": "string"},
                            "file_ownership": {"type": "array", "items": {"type": "string"}},
                        }}},
                    }),
                ),
            },
            ToolDef {
                name: "validation_trigger",
                group: "validation",
                description: "Record that a validation run started",
                input_schema: schema(
                    &["project_id", "scope", "trigger"],
                    json!({
                        "project_id": {"type": "string"},
                        "scope": {"type": "string"},
                        "trigger": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "validation_complete",
                group: "validation",
                description: "Record a validation run's result",
                input_schema: schema(
                    &["project_id", "scope", "passed"],
                    json!({
                        "project_id": {"type": "string"},
                        "scope": {"type": "string"},
                        "passed": {"type": "boolean"},
                        "details": {},
                    }),
                ),
            },
            ToolDef {
                name: "decision_record",
                group: "decision",
                description: "Record a workflow decision with rationale",
                input_schema: schema(
                    &["project_id", "actor", "decision"],
                    json!({
                        "project_id": {"type": "string"},
                        "actor": {"type": "string"},
                        "decision": {"type": "string"},
                        "rationale": {},
                    }),
                ),
            },
            ToolDef {
                name: "risk_add",
                group: "risk",
                description: "Record a project risk",
                input_schema: schema(
                    &["project_id", "risk_id", "description", "severity"],
                    json!({
                        "project_id": {"type": "string"},
                        "risk_id": {"type": "string"},
                        "description": {"type": "string"},
                        "severity": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "risk_resolve",
                group: "risk",
                description: "Resolve a recorded risk",
                input_schema: schema(
                    &["project_id", "risk_id", "resolution"],
                    json!({
                        "project_id": {"type": "string"},
                        "risk_id": {"type": "string"},
                        "resolution": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "cost_summary",
                group: "cost",
                description: "Token spend for a project, by agent",
                input_schema: schema(&["project_id"], json!({"project_id": {"type": "string"}})),
            },
            ToolDef {
                name: "document_store",
                group: "document",
                description: "Store the next version of a gate document",
                input_schema: schema(
                    &["project_id", "doc_type", "content"],
                    json!({
                        "project_id": {"type": "string"},
                        "doc_type": {"type": "string"},
                        "content": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "document_latest",
                group: "document",
                description: "The latest version of a gate document",
                input_schema: schema(
                    &["project_id", "doc_type"],
                    json!({
                        "project_id": {"type": "string"},
                        "doc_type": {"type": "string"},
                    }),
                ),
            },
            ToolDef {
                name: "assess_start",
                group: "assessment",
                description: "Start a parallel assessment session",
                input_schema: schema(
                    &["project_id", "agents"],
                    json!({
                        "project_id": {"type": "string"},
                        "agents": {"type": "array", "items": {"type": "string"}},
                    }),
                ),
            },
            ToolDef {
                name: "assess_submit",
                group: "assessment",
                description: "Submit an evaluator's scored result",
                input_schema: schema(
                    &["project_id", "agent", "score"],
                    json!({
                        "project_id": {"type": "string"},
                        "agent": {"type": "string"},
                        "score": {"type": "number"},
                        "strengths": {"type": "array", "items": {"type": "string"}},
                        "weaknesses": {"type": "array", "items": {"type": "string"}},
                        "recommendations": {"type": "array", "items": {"type": "string"}},
                        "metrics": {},
                        "details": {},
                    }),
                ),
            },
            ToolDef {
                name: "assess_check",
                group: "assessment",
                description: "Check whether every evaluator is terminal",
                input_schema: schema(&["project_id"], json!({"project_id": {"type": "string"}})),
            },
            ToolDef {
                name: "assess_aggregate",
                group: "assessment",
                description: "Aggregate submitted sections into the weighted verdict",
                input_schema: schema(&["project_id"], json!({"project_id": {"type": "string"}})),
            },
            ToolDef {
                name: "healing_scan",
                group: "healing",
                description: "Retry failed tasks with promoted priority; surface exhausted ones",
                input_schema: schema(&["project_id"], json!({"project_id": {"type": "string"}})),
            },
        ]
    }

    /// Lists resource URIs for a project.
    pub fn resources(&self, project_id: &str) -> Vec<String> {
        vec![format!("project://{project_id}/state")]
    }

    /// Reads a `project://<id>/state` resource as JSON.
    pub async fn read_resource(&self, uri: &str) -> GateflowResult<Value> {
        let project_id = uri
            .strip_prefix("project://")
            .and_then(|rest| rest.strip_suffix("/state"))
            .ok_or_else(|| GateflowError::invalid(format!("unknown resource uri: {uri}")))?;
        let snapshot = self.coordinator.truth().state(project_id).await?;
        Ok(serde_json::to_value(snapshot)?)
    }

    /// Invokes a tool. Errors carry the taxonomy kind; use
    /// [`ToolCatalog::call`] for a JSON error envelope instead.
    pub async fn invoke(&self, name: &str, arguments: &Value) -> GateflowResult<Value> {
        debug!(tool = %name, "tool invoked");
        match name {
            "project_create" => self.project_create(arguments).await,
            "state_get" => self.state_get(arguments).await,
            "state_events" => self.state_events(arguments).await,
            "state_stats" => self.state_stats(arguments).await,
            "gate_current" => self.gate_current(arguments).await,
            "gate_can_transition" => self.gate_can_transition(arguments).await,
            "gate_present" => self.gate_present(arguments).await,
            "gate_approve" => self.gate_approve(arguments).await,
            "gate_reject" => self.gate_reject(arguments).await,
            "spec_register" => self.spec_register(arguments).await,
            "spec_list" => self.spec_list(arguments).await,
            "task_enqueue" => self.task_enqueue(arguments).await,
            "task_dequeue" => self.task_dequeue(arguments).await,
            "task_complete" => self.task_complete(arguments).await,
            "task_retry" => self.task_retry(arguments).await,
            "task_history" => self.task_history(arguments).await,
            "worker_register" => self.worker_register(arguments).await,
            "worker_deregister" => self.worker_deregister(arguments).await,
            "proof_submit" => self.proof_submit(arguments).await,
            "proof_verify" => self.proof_verify(arguments).await,
            "proof_gate_status" => self.proof_gate_status(arguments).await,
            "proof_report" => self.proof_report(arguments).await,
            "spawn_record" => self.spawn_record(arguments).await,
            "spawn_complete" => self.spawn_complete(arguments).await,
            "spawn_validate_gate" => self.spawn_validate_gate(arguments).await,
            "spawn_validate_before_work" => self.spawn_validate_before_work(arguments).await,
            "spawn_check_parallel" => self.spawn_check_parallel(arguments).await,
            "validation_trigger" => self.validation_trigger(arguments).await,
            "validation_complete" => self.validation_complete(arguments).await,
            "decision_record" => self.decision_record(arguments).await,
            "risk_add" => self.risk_add(arguments).await,
            "risk_resolve" => self.risk_resolve(arguments).await,
            "cost_summary" => self.cost_summary(arguments).await,
            "document_store" => self.document_store(arguments).await,
            "document_latest" => self.document_latest(arguments).await,
            "assess_start" => self.assess_start(arguments).await,
            "assess_submit" => self.assess_submit(arguments).await,
            "assess_check" => self.assess_check(arguments).await,
            "assess_aggregate" => self.assess_aggregate(arguments).await,
            "healing_scan" => self.healing_scan(arguments).await,
            other => Err(GateflowError::not_found("tool", other)),
        }
    }

    /// Invokes a tool and wraps the result (or error) in a JSON envelope.
    pub async fn call(&self, name: &str, arguments: &Value) -> Value {
        match self.invoke(name, arguments).await {
            Ok(result) => json!({"ok": true, "result": result}),
            Err(err) => {
                let issues = match &err {
                    GateflowError::InvalidInput { issues, .. } => {
                        serde_json::to_value(issues).unwrap_or(Value::Null)
                    }
                    _ => Value::Null,
                };
                json!({
                    "ok": false,
                    "error": {
                        "kind": err.kind(),
                        "message": err.to_string(),
                        "issues": issues,
                    },
                })
            }
        }
    }

    async fn project_create(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let name = r.str("name");
        let owner = r.str("owner");
        let kind = match r.opt_str("kind").as_deref() {
            Some("ai_ml") => ProjectKind::AiMl,
            _ => ProjectKind::Standard,
        };
        r.finish()?;
        self.coordinator
            .create_project(&project_id, &name, &owner, kind)
            .await?;
        Ok(json!({"project_id": project_id}))
    }

    async fn state_get(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        r.finish()?;
        let snapshot = self.coordinator.truth().state(&project_id).await?;
        Ok(serde_json::to_value(snapshot)?)
    }

    async fn state_events(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let filter = EventFilter {
            event_types: r.opt_str_array("event_types"),
            gate: r.opt_gate("gate"),
            task_id: r.opt_uuid("task_id"),
            since: None,
            until: None,
        };
        r.finish()?;
        let events = self.coordinator.truth().events(&project_id, &filter).await?;
        Ok(serde_json::to_value(events)?)
    }

    async fn state_stats(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        r.finish()?;
        let stats = self.coordinator.truth().stats(&project_id).await?;
        Ok(serde_json::to_value(stats)?)
    }

    async fn gate_current(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        r.finish()?;
        let gate = self.coordinator.machine().current_gate(&project_id).await?;
        Ok(json!({"gate": gate.to_string()}))
    }

    async fn gate_can_transition(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let gate = r.gate("gate");
        let actor = r.str("actor");
        r.finish()?;
        let check = self
            .coordinator
            .machine()
            .can_transition(&project_id, gate, &actor)
            .await?;
        Ok(serde_json::to_value(check)?)
    }

    async fn gate_present(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let gate = r.gate("gate");
        let actor = r.str("actor");
        let notes = r.opt_str("notes");
        r.finish()?;
        let seq = self
            .coordinator
            .present_gate(&project_id, gate, &actor, notes)
            .await?;
        Ok(json!({"seq": seq}))
    }

    async fn gate_approve(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let gate = r.gate("gate");
        let actor = r.str("actor");
        let response = r.str("approval_response");
        let notes = r.opt_str("notes");
        let force = r.flag("force_without_proofs");
        r.finish()?;
        let outcome = self
            .coordinator
            .approve_gate(&project_id, gate, &actor, &response, notes, force)
            .await?;
        Ok(serde_json::to_value(outcome)?)
    }

    async fn gate_reject(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let gate = r.gate("gate");
        let actor = r.str("actor");
        let reason = r.str("blocking_reason");
        r.finish()?;
        let seq = self
            .coordinator
            .machine()
            .reject_gate(&project_id, gate, &actor, &reason)
            .await?;
        Ok(json!({"seq": seq}))
    }

    async fn spec_register(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let spec_type: Option<SpecType> = r.parsed("spec_type", "spec type");
        let path = r.str("path");
        let checksum = r.str("checksum");
        let actor = r.str("actor");
        r.finish()?;
        let spec_type = spec_type.ok_or_else(|| GateflowError::invalid("spec_type missing"))?;
        let registration = self
            .coordinator
            .specs()
            .register(&project_id, spec_type, &path, &checksum, &actor)
            .await?;
        Ok(serde_json::to_value(registration)?)
    }

    async fn spec_list(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        r.finish()?;
        let specs = self.coordinator.specs().list(&project_id).await?;
        Ok(serde_json::to_value(specs)?)
    }

    async fn task_enqueue(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let task_type = r.str("task_type");
        let description = r.str("description");
        let category = r
            .opt_str("worker_category")
            .and_then(|raw| parse_wire_enum::<WorkerCategory>(&raw));
        if category.is_none() {
            let _ = r.str("worker_category");
        }
        let priority = r
            .opt_str("priority")
            .and_then(|raw| parse_wire_enum::<TaskPriority>(&raw));
        let depends_on: Vec<uuid::Uuid> = r
            .opt_str_array("depends_on")
            .iter()
            .filter_map(|raw| uuid::Uuid::parse_str(raw).ok())
            .collect();
        let gate_dependency = r.opt_gate("gate_dependency");
        let spec_refs = r.opt_str_array("spec_refs");
        r.finish()?;
        let category = category
            .ok_or_else(|| GateflowError::invalid("worker_category must be planning/generation/validation"))?;

        let mut task = Task::new(project_id, task_type, description, category)
            .with_spec_refs(spec_refs)
            .with_depends_on(depends_on);
        if let Some(priority) = priority {
            task = task.with_priority(priority);
        }
        if let Some(gate) = gate_dependency {
            task = task.with_gate_dependency(gate);
        }
        let id = self.coordinator.queue().enqueue(task).await?;
        Ok(json!({"task_id": id.to_string()}))
    }

    async fn task_dequeue(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let worker_id = r.uuid("worker_id");
        let category = r
            .opt_str("category")
            .and_then(|raw| parse_wire_enum::<WorkerCategory>(&raw));
        if category.is_none() {
            let _ = r.str("category");
        }
        r.finish()?;
        let category = category
            .ok_or_else(|| GateflowError::invalid("category must be planning/generation/validation"))?;
        let task = self.coordinator.queue().dequeue(worker_id, category).await?;
        Ok(serde_json::to_value(task)?)
    }

    async fn task_complete(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let task_id = r.uuid("task_id");
        let worker_id = r.uuid("worker_id");
        let outcome = r.str("outcome");
        let output = r.opt_str("output");
        let error = r.opt_str("error");
        r.finish()?;
        let outcome = match outcome.as_str() {
            "complete" => TaskOutcome::Complete,
            "failed" => TaskOutcome::Failed,
            other => {
                return Err(GateflowError::invalid(format!(
                    "outcome must be complete or failed, got {other}"
                )))
            }
        };
        self.coordinator
            .queue()
            .complete(task_id, worker_id, outcome, output, error)
            .await?;
        Ok(json!({"task_id": task_id.to_string()}))
    }

    async fn task_retry(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let task_id = r.uuid("task_id");
        r.finish()?;
        let task = self.coordinator.queue().retry(task_id).await?;
        Ok(serde_json::to_value(task)?)
    }

    async fn task_history(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let task_id = r.uuid("task_id");
        r.finish()?;
        let events = self
            .coordinator
            .queue()
            .history(&project_id, task_id)
            .await?;
        Ok(serde_json::to_value(events)?)
    }

    async fn worker_register(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let category = r
            .opt_str("category")
            .and_then(|raw| parse_wire_enum::<WorkerCategory>(&raw));
        if category.is_none() {
            let _ = r.str("category");
        }
        let capabilities = r.opt_str_array("capabilities");
        r.finish()?;
        let category = category
            .ok_or_else(|| GateflowError::invalid("category must be planning/generation/validation"))?;
        let worker = Worker::new(category).with_capabilities(capabilities);
        let id = self.coordinator.workers().register(&project_id, worker).await?;
        Ok(json!({"worker_id": id.to_string()}))
    }

    async fn worker_deregister(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let worker_id = r.uuid("worker_id");
        r.finish()?;
        self.coordinator.workers().deregister(worker_id).await?;
        Ok(json!({"worker_id": worker_id.to_string()}))
    }

    async fn proof_submit(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let gate = r.gate("gate");
        let proof_type: Option<ProofType> = r.parsed("proof_type", "proof type");
        let file_path = r.str("file_path");
        let content_summary = r.opt_str("content_summary").unwrap_or_default();
        let pass_fail = r
            .opt_str("pass_fail")
            .and_then(|raw| parse_wire_enum::<PassFail>(&raw));
        if pass_fail.is_none() {
            let _ = r.str("pass_fail");
        }
        let created_by = r.str("created_by");
        r.finish()?;
        let artifact_id = self
            .coordinator
            .proofs()
            .submit(ProofSubmission {
                project_id,
                gate,
                proof_type: proof_type
                    .ok_or_else(|| GateflowError::invalid("proof_type missing"))?,
                file_path,
                content_summary,
                pass_fail: pass_fail
                    .ok_or_else(|| GateflowError::invalid("pass_fail must be pass or fail"))?,
                created_by,
            })
            .await?;
        Ok(json!({"artifact_id": artifact_id.to_string()}))
    }

    async fn proof_verify(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let artifact_id = r.uuid("artifact_id");
        r.finish()?;
        let report = self
            .coordinator
            .proofs()
            .verify(&project_id, artifact_id)
            .await?;
        Ok(serde_json::to_value(report)?)
    }

    async fn proof_gate_status(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let gate = r.gate("gate");
        r.finish()?;
        let status = self
            .coordinator
            .proofs()
            .gate_proof_status(&project_id, gate)
            .await?;
        Ok(serde_json::to_value(status)?)
    }

    async fn proof_report(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        r.finish()?;
        let report = self.coordinator.proofs().generate_report(&project_id).await?;
        Ok(json!({"report": report}))
    }

    async fn spawn_record(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let agent: Option<AgentRole> = r.parsed("agent", "agent role");
        let gate = r.gate("gate");
        let task_description = r.str("task_description");
        r.finish()?;
        let agent = agent.ok_or_else(|| GateflowError::invalid("agent missing"))?;
        let spawn_id = self
            .coordinator
            .enforcer()
            .record_spawn(&project_id, agent, gate, &task_description)
            .await?;
        Ok(json!({"spawn_id": spawn_id.to_string()}))
    }

    async fn spawn_complete(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let spawn_id = r.uuid("spawn_id");
        let status = r
            .opt_str("status")
            .and_then(|raw| parse_wire_enum::<SpawnStatus>(&raw));
        if status.is_none() {
            let _ = r.str("status");
        }
        let result_summary = r.opt_str("result_summary");
        let input_tokens = r.opt_f64("input_tokens");
        let output_tokens = r.opt_f64("output_tokens");
        r.finish()?;
        let token_usage = match (input_tokens, output_tokens) {
            (None, None) => None,
            (input, output) => Some(gateflow_core::TokenUsage {
                input_tokens: input.unwrap_or(0.0) as u64,
                output_tokens: output.unwrap_or(0.0) as u64,
            }),
        };
        self.coordinator
            .enforcer()
            .complete_spawn(
                &project_id,
                SpawnCompletion {
                    spawn_id,
                    status: status
                        .ok_or_else(|| GateflowError::invalid("status must be completed or failed"))?,
                    result_summary,
                    proof_artifact_ids: vec![],
                    token_usage,
                },
            )
            .await?;
        Ok(json!({"spawn_id": spawn_id.to_string()}))
    }

    async fn spawn_validate_gate(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let gate = r.gate("gate");
        r.finish()?;
        let validation = self
            .coordinator
            .enforcer()
            .validate_for_gate(&project_id, gate)
            .await?;
        Ok(serde_json::to_value(validation)?)
    }

    async fn spawn_validate_before_work(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let gate = r.gate("gate");
        let intended_action = r.str("intended_action");
        r.finish()?;
        let check = self
            .coordinator
            .enforcer()
            .validate_before_gate_work(&project_id, gate, &intended_action)
            .await?;
        Ok(serde_json::to_value(check)?)
    }

    async fn spawn_check_parallel(&self, args: &Value) -> GateflowResult<Value> {
        let agents: Vec<AgentOwnership> = serde_json::from_value(
            args.get("agents").cloned().unwrap_or(Value::Null),
        )
        .map_err(|e| {
            GateflowError::invalid_fields(
                "malformed agents array",
                vec![gateflow_core::FieldIssue::new("agents", e.to_string())],
            )
        })?;
        let check = check_parallel_spawn_conflicts(&agents);
        Ok(serde_json::to_value(check)?)
    }

    async fn validation_trigger(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let scope = r.str("scope");
        let trigger = r.str("trigger");
        r.finish()?;
        let seq = self
            .coordinator
            .truth()
            .append(
                &project_id,
                "validation",
                EventKind::ValidationTriggered { scope, trigger },
            )
            .await?;
        Ok(json!({"seq": seq}))
    }

    async fn validation_complete(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let scope = r.str("scope");
        let passed = args.get("passed").and_then(Value::as_bool);
        let details = r.raw("details");
        r.finish()?;
        let passed = passed
            .ok_or_else(|| GateflowError::invalid("passed must be a boolean"))?;
        let seq = self
            .coordinator
            .truth()
            .append(
                &project_id,
                "validation",
                EventKind::ValidationCompleted {
                    scope,
                    passed,
                    details,
                },
            )
            .await?;
        Ok(json!({"seq": seq}))
    }

    async fn decision_record(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let actor = r.str("actor");
        let decision = r.str("decision");
        let rationale = r.raw("rationale");
        r.finish()?;
        let seq = self
            .coordinator
            .truth()
            .append(
                &project_id,
                &actor,
                EventKind::DecisionMade {
                    decision,
                    rationale,
                },
            )
            .await?;
        Ok(json!({"seq": seq}))
    }

    async fn risk_add(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let risk_id = r.str("risk_id");
        let description = r.str("description");
        let severity = r.str("severity");
        r.finish()?;
        let seq = self
            .coordinator
            .truth()
            .append(
                &project_id,
                "risk",
                EventKind::RiskAdded {
                    risk_id,
                    description,
                    severity,
                },
            )
            .await?;
        Ok(json!({"seq": seq}))
    }

    async fn risk_resolve(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let risk_id = r.str("risk_id");
        let resolution = r.str("resolution");
        r.finish()?;
        let seq = self
            .coordinator
            .truth()
            .append(
                &project_id,
                "risk",
                EventKind::RiskResolved {
                    risk_id,
                    resolution,
                },
            )
            .await?;
        Ok(json!({"seq": seq}))
    }

    async fn cost_summary(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        r.finish()?;
        let summary = self.coordinator.costs().summary(&project_id).await;
        Ok(serde_json::to_value(summary)?)
    }

    async fn document_store(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let doc_type = r.str("doc_type");
        let content = r.str("content");
        r.finish()?;
        let (version, path) = self
            .coordinator
            .documents()
            .store(&project_id, &doc_type, &content)
            .await?;
        Ok(json!({"version": version, "path": path}))
    }

    async fn document_latest(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let doc_type = r.str("doc_type");
        r.finish()?;
        match self
            .coordinator
            .documents()
            .latest(&project_id, &doc_type)
            .await?
        {
            Some((version, content)) => Ok(json!({"version": version, "content": content})),
            None => Ok(Value::Null),
        }
    }

    async fn assess_start(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let agents = r.opt_str_array("agents");
        r.finish()?;
        let session_id = self
            .coordinator
            .assessments()
            .start(&project_id, agents, None)
            .await?;
        Ok(json!({"session_id": session_id.to_string()}))
    }

    async fn assess_submit(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        let agent = r.str("agent");
        let score = r.f64("score");
        let findings = Findings {
            strengths: r.opt_str_array("strengths"),
            weaknesses: r.opt_str_array("weaknesses"),
            recommendations: r.opt_str_array("recommendations"),
        };
        let metrics = r.raw("metrics");
        let details = r.raw("details");
        r.finish()?;
        self.coordinator
            .assessments()
            .submit_result(&project_id, &agent, score, findings, metrics, details)
            .await?;
        Ok(json!({"agent": agent, "status": "submitted"}))
    }

    async fn assess_check(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        r.finish()?;
        let check = self
            .coordinator
            .assessments()
            .check_completion(&project_id)
            .await?;
        Ok(serde_json::to_value(check)?)
    }

    async fn assess_aggregate(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        r.finish()?;
        let result = self.coordinator.assessments().aggregate(&project_id).await?;
        Ok(serde_json::to_value(result)?)
    }

    async fn healing_scan(&self, args: &Value) -> GateflowResult<Value> {
        let mut r = ArgReader::new(args);
        let project_id = r.str("project_id");
        r.finish()?;
        let report = self
            .coordinator
            .check_and_retry_stuck_gate(&project_id)
            .await?;
        Ok(serde_json::to_value(report)?)
    }
}
