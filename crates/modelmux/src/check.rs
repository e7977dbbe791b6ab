// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `modelmux check` and `modelmux route`.

use std::fmt::Write;

use modelmux_config::ModelmuxConfig;
use modelmux_core::{ChatCompletionRequest, ChatMessage, MuxError, TaskType};
use modelmux_router::{ModelRegistry, RoutingDecision};
use strum::IntoEnumIterator;

use crate::app;

/// Validates configuration end to end and prints the routing table.
pub fn run_check(config: &ModelmuxConfig) -> Result<(), MuxError> {
    let registry = app::build_registry(config)?;
    print!("{}", routing_table(&registry));
    println!("configuration ok");
    Ok(())
}

/// Primary and fallbacks for every task type, one line each.
pub fn routing_table(registry: &ModelRegistry) -> String {
    let mut out = String::new();
    for task in TaskType::iter() {
        let primary = registry.primary_for(task);
        let fallbacks = registry
            .fallbacks_for(&primary)
            .iter()
            .map(|p| p.name.clone())
            .collect::<Vec<_>>();
        let _ = writeln!(
            out,
            "{:<16} {:<20} fallbacks: {}",
            task.to_string(),
            primary.name,
            if fallbacks.is_empty() {
                "-".to_string()
            } else {
                fallbacks.join(", ")
            }
        );
    }
    out
}

/// Classifies `prompt` and prints the decision. Completion backends are not called.
pub async fn run_route(config: &ModelmuxConfig, prompt: &str) -> Result<(), MuxError> {
    let components = app::build(config)?;
    let request = ChatCompletionRequest::new(vec![ChatMessage::user(prompt)]);
    let decision = components.service.plan(&request).await;
    print!("{}", describe_decision(&decision));
    Ok(())
}

pub fn describe_decision(decision: &RoutingDecision) -> String {
    let c = &decision.classification;
    let mut out = format!(
        "task type:  {}\nconfidence: {:.2}\nsource:     {}\nelapsed:    {}ms\n",
        c.task_type,
        c.confidence,
        c.source,
        c.elapsed.as_millis()
    );
    if let Some(cause) = &c.failure {
        let _ = writeln!(out, "cause:      {cause}");
    }
    let _ = writeln!(out, "candidates: {}", decision.names().join(" -> "));
    out
}
