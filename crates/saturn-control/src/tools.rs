//! Tool invocation engine.
//!
//! Input is validated against the tool's schema before any dispatch happens.
//! Dispatch is an exhaustive match on [`ToolKind`], one handler per kind.

use chrono::Utc;
use saturn_core::{AgentId, TenantId, ToolId};
use saturn_store::{
    AgentTool, JsonSchema, JsonType, Store, Tool, ToolKind, ToolStatus, UsageEventType,
};
use serde_json::Value;

use crate::error::{ControlError, Result};
use crate::metrics::Metrics;
use crate::types::{CreateToolRequest, ToolOutput};
use crate::usage;

/// Parse a raw schema document, reporting problems as schema errors on `field`.
///
/// # Errors
///
/// Returns `ControlError::ToolSchemaInvalid` if the document is not a valid
/// schema (unknown `type`, malformed `required` or `properties`).
pub fn parse_schema(field: &str, raw: &Value) -> Result<JsonSchema> {
    serde_json::from_value(raw.clone())
        .map_err(|e| ControlError::schema_field(field, format!("invalid schema: {e}")))
}

/// Check `payload` against an object schema.
///
/// Every `required` name must be present, and every payload key with a declared
/// property type must hold a value of that type. Undeclared keys are accepted.
///
/// # Errors
///
/// Returns `ControlError::ToolSchemaInvalid` naming the offending field.
pub fn validate(schema: &JsonSchema, payload: &Value) -> Result<()> {
    if schema.schema_type != JsonType::Object {
        return Err(ControlError::ToolSchemaInvalid {
            field: None,
            message: "only object schemas are supported".to_string(),
        });
    }

    let Some(object) = payload.as_object() else {
        return Err(ControlError::ToolSchemaInvalid {
            field: None,
            message: "input must be an object".to_string(),
        });
    };

    if let Some(missing) = schema.required.iter().find(|name| !object.contains_key(*name)) {
        return Err(ControlError::schema_field(
            missing.as_str(),
            format!("missing required field: {missing}"),
        ));
    }

    for (key, value) in object {
        let expected = schema
            .properties
            .get(key)
            .and_then(|property| property.property_type);

        if let Some(expected) = expected {
            if !expected.matches(value) {
                return Err(ControlError::schema_field(
                    key.as_str(),
                    format!("field {key} must be of type {}", expected.as_str()),
                ));
            }
        }
    }

    Ok(())
}

/// Create a tool after validating its schemas.
///
/// # Errors
///
/// Returns `ControlError::BadRequest` for an empty name and
/// `ControlError::ToolSchemaInvalid` for malformed schemas.
pub fn create_tool<S: Store>(
    store: &S,
    tenant: &TenantId,
    request: CreateToolRequest,
) -> Result<Tool> {
    if request.name.trim().is_empty() {
        return Err(ControlError::BadRequest("tool name must not be empty".into()));
    }

    let input_schema = parse_schema("input_schema", &request.input_schema)?;
    if input_schema.schema_type != JsonType::Object {
        return Err(ControlError::schema_field(
            "input_schema",
            "input schema must have type object",
        ));
    }
    let output_schema = request
        .output_schema
        .as_ref()
        .map(|raw| parse_schema("output_schema", raw))
        .transpose()?;

    let now = Utc::now();
    let tool = Tool {
        tool_id: ToolId::generate(),
        tenant_id: tenant.clone(),
        name: request.name,
        description: request.description,
        kind: request.kind,
        input_schema,
        output_schema,
        config: request.config,
        status: request.status,
        created_at: now,
        updated_at: now,
    };
    store.put_tool(&tool)?;

    tracing::info!(tool_id = %tool.tool_id, kind = ?tool.kind, "Created tool");
    Ok(tool)
}

/// Get a tool.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the tool doesn't exist for the tenant.
pub fn get_tool<S: Store>(store: &S, tenant: &TenantId, tool_id: &ToolId) -> Result<Tool> {
    store
        .get_tool(tenant, tool_id)?
        .ok_or_else(|| ControlError::NotFound("tool".to_string()))
}

/// Attach a tool to an agent.
///
/// Returns the edge and whether it was created; attaching twice is a no-op.
///
/// # Errors
///
/// Returns `ControlError::AgentNotFound` or `ControlError::NotFound` if the
/// agent or tool doesn't exist for the tenant.
pub fn attach<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
    tool_id: &ToolId,
    policy: Option<Value>,
) -> Result<(AgentTool, bool)> {
    require_agent(store, tenant, agent_id)?;
    get_tool(store, tenant, tool_id)?;

    let edge = AgentTool {
        tenant_id: tenant.clone(),
        agent_id: *agent_id,
        tool_id: *tool_id,
        policy,
        created_at: Utc::now(),
    };

    if store.attach_tool(&edge)? {
        tracing::info!(agent_id = %agent_id, tool_id = %tool_id, "Attached tool");
        return Ok((edge, true));
    }

    let existing = store
        .get_agent_tool(tenant, agent_id, tool_id)?
        .ok_or_else(|| ControlError::Internal("attachment vanished".to_string()))?;
    Ok((existing, false))
}

/// Detach a tool from an agent. Returns whether an edge was removed.
///
/// # Errors
///
/// Returns `ControlError::AgentNotFound` if the agent doesn't exist for the tenant.
pub fn detach<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
    tool_id: &ToolId,
) -> Result<bool> {
    require_agent(store, tenant, agent_id)?;

    let removed = store.detach_tool(tenant, agent_id, tool_id)?;
    if removed {
        tracing::info!(agent_id = %agent_id, tool_id = %tool_id, "Detached tool");
    }
    Ok(removed)
}

/// List the tools attached to an agent, in attachment-key order.
///
/// # Errors
///
/// Returns `ControlError::AgentNotFound` if the agent doesn't exist for the tenant.
pub fn list_agent_tools<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
) -> Result<Vec<Tool>> {
    require_agent(store, tenant, agent_id)?;

    let mut tools = Vec::new();
    for edge in store.list_agent_tools(tenant, agent_id)? {
        if let Some(tool) = store.get_tool(tenant, &edge.tool_id)? {
            tools.push(tool);
        }
    }
    Ok(tools)
}

/// Invoke a tool.
///
/// The tool is loaded, the input validated, the tool's status checked and,
/// when `agent_id` is given, its attachment to that agent, before dispatch.
/// A successful invocation on behalf of an agent records one `tool_call` usage
/// event. Every outcome is counted in `metrics`, and a failed usage write
/// counts as a failed call.
///
/// # Errors
///
/// Returns `ControlError::ToolNotAllowed` if the tool is missing, disabled or
/// not attached, `ControlError::ToolSchemaInvalid` if the input fails
/// validation, and `ControlError::AgentNotFound` for an unknown agent.
pub fn execute<S: Store>(
    store: &S,
    metrics: &Metrics,
    tenant: &TenantId,
    tool_id: &ToolId,
    input: &Value,
    agent_id: Option<&AgentId>,
) -> Result<ToolOutput> {
    let result = invoke(store, tenant, tool_id, input, agent_id).and_then(|output| {
        if let Some(agent_id) = agent_id {
            usage::record(
                store,
                tenant,
                agent_id,
                None,
                UsageEventType::ToolCall,
                1,
                UsageEventType::ToolCall.default_unit(),
            )?;
        }
        Ok(output)
    });
    metrics.record_tool_call(result.is_ok());

    match &result {
        Ok(_) => tracing::info!(tool_id = %tool_id, "Tool invocation succeeded"),
        Err(e) => tracing::warn!(tool_id = %tool_id, error = %e, "Tool invocation failed"),
    }

    result
}

fn invoke<S: Store>(
    store: &S,
    tenant: &TenantId,
    tool_id: &ToolId,
    input: &Value,
    agent_id: Option<&AgentId>,
) -> Result<ToolOutput> {
    if let Some(agent_id) = agent_id {
        require_agent(store, tenant, agent_id)?;
    }

    let tool = store
        .get_tool(tenant, tool_id)?
        .ok_or_else(|| ControlError::ToolNotAllowed {
            tool_id: *tool_id,
            reason: "tool not found".to_string(),
        })?;

    validate(&tool.input_schema, input)?;

    if tool.status != ToolStatus::Active {
        return Err(ControlError::ToolNotAllowed {
            tool_id: *tool_id,
            reason: "tool is disabled".to_string(),
        });
    }

    if let Some(agent_id) = agent_id {
        if store.get_agent_tool(tenant, agent_id, tool_id)?.is_none() {
            return Err(ControlError::ToolNotAllowed {
                tool_id: *tool_id,
                reason: format!("tool is not attached to agent {agent_id}"),
            });
        }
    }

    Ok(dispatch(&tool, input))
}

fn dispatch(tool: &Tool, input: &Value) -> ToolOutput {
    match tool.kind {
        ToolKind::Builtin | ToolKind::Http => ToolOutput::Ok {
            echo: input.clone(),
        },
        ToolKind::Workflow => ToolOutput::Queued {
            job_id: uuid::Uuid::new_v4(),
        },
    }
}

fn require_agent<S: Store>(store: &S, tenant: &TenantId, agent_id: &AgentId) -> Result<()> {
    store
        .get_agent(tenant, agent_id)?
        .map(|_| ())
        .ok_or(ControlError::AgentNotFound(*agent_id))
}
