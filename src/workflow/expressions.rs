//! Template evaluation for `${{ }}` syntax in stage commands
//!
//! Supports:
//! - ${{ env.VAR_NAME }}
//! - ${{ secrets.SECRET_NAME }}
//! - ${{ config.image_name }}, ${{ config.image_tag }}, ${{ config.image }},
//!   ${{ config.target_url }}
//! - ${{ run.id }}, ${{ run.stage }}
//!
//! A template always expands in place inside a single argument; the result
//! is never split on whitespace and never seen by a shell.

use regex::Regex;
use std::sync::LazyLock;

use super::context::ExecutionContext;
use super::pipeline::CommandSpec;

static EXPRESSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{\s*([^}]+?)\s*\}\}").unwrap());

/// Errors that can occur during template evaluation
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Invalid expression syntax: {0}")]
    InvalidSyntax(String),

    #[error("Missing context: {0}")]
    MissingContext(String),
}

/// Evaluate all expressions in a string
pub fn evaluate(input: &str, ctx: &ExecutionContext) -> Result<String, ExpressionError> {
    let mut result = String::with_capacity(input.len());
    let mut last = 0;

    for cap in EXPRESSION_REGEX.captures_iter(input) {
        let (Some(full), Some(expr)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        result.push_str(&input[last..full.start()]);
        result.push_str(&evaluate_single(expr.as_str().trim(), ctx)?);
        last = full.end();
    }
    result.push_str(&input[last..]);

    Ok(result)
}

/// Evaluate a single expression (without the ${{ }} wrapper)
fn evaluate_single(expr: &str, ctx: &ExecutionContext) -> Result<String, ExpressionError> {
    let parts: Vec<&str> = expr.split('.').collect();

    if parts.len() != 2 || parts[1].is_empty() {
        return Err(ExpressionError::InvalidSyntax(format!(
            "expected <scope>.<name>, got: {}",
            expr
        )));
    }

    match parts[0] {
        "env" => ctx
            .get_env(parts[1])
            .cloned()
            .ok_or_else(|| ExpressionError::UnknownVariable(format!("env.{}", parts[1]))),

        "secrets" => ctx
            .get_secret(parts[1])
            .cloned()
            .ok_or_else(|| ExpressionError::UnknownVariable(format!("secrets.{}", parts[1]))),

        "config" => ctx
            .get_config(parts[1])
            .cloned()
            .ok_or_else(|| ExpressionError::UnknownVariable(format!("config.{}", parts[1]))),

        "run" => match parts[1] {
            "id" => Ok(ctx.run_id.clone()),
            "stage" => ctx
                .current_stage
                .clone()
                .ok_or_else(|| ExpressionError::MissingContext("current stage".to_string())),
            _ => Err(ExpressionError::UnknownVariable(expr.to_string())),
        },

        _ => Err(ExpressionError::UnknownVariable(expr.to_string())),
    }
}

/// Render the program and every argument of a command
pub fn evaluate_command(
    command: &CommandSpec,
    ctx: &ExecutionContext,
) -> Result<CommandSpec, ExpressionError> {
    let program = evaluate(&command.program, ctx)?;
    let args = command
        .args
        .iter()
        .map(|arg| evaluate(arg, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CommandSpec { program, args })
}

/// Check that every expression in `input` is syntactically valid,
/// without resolving values
pub fn validate(input: &str) -> Result<(), ExpressionError> {
    for cap in EXPRESSION_REGEX.captures_iter(input) {
        let Some(expr) = cap.get(1) else { continue };
        let expr = expr.as_str().trim();
        let parts: Vec<&str> = expr.split('.').collect();
        let known_scope = matches!(parts[0], "env" | "secrets" | "config" | "run");
        if parts.len() != 2 || parts[1].is_empty() || !known_scope {
            return Err(ExpressionError::InvalidSyntax(expr.to_string()));
        }
    }
    Ok(())
}
