//! Handlebars template for the synthesized final document
//!
//! Synthesis is deterministic string templating over step outputs; no model
//! is involved, so the same outputs always produce the same document.

use super::error::{WorkflowError, WorkflowResult};
use super::plan::WorkflowStep;
use handlebars::Handlebars;
use serde::Serialize;

const SYNTHESIS_TEMPLATE_NAME: &str = "synthesis";

const SYNTHESIS_TEMPLATE: &str = "{{#each sections}}{{separator}}## {{title}}\n\n{{output}}{{/each}}\n\n---\n\n**Summary:** {{count}} specialized {{noun}} collaborated on this response: {{agent_list}}.";

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Serialize)]
struct Section<'a> {
    separator: &'static str,
    title: String,
    output: &'a str,
}

#[derive(Serialize)]
struct SynthesisData<'a> {
    sections: Vec<Section<'a>>,
    count: usize,
    noun: &'static str,
    agent_list: String,
}

/// Renders completed steps into one document
pub struct Synthesizer {
    handlebars: Handlebars<'static>,
}

impl Synthesizer {
    pub fn new() -> WorkflowResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // Output is markdown, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(SYNTHESIS_TEMPLATE_NAME, SYNTHESIS_TEMPLATE)
            .map_err(|e| WorkflowError::Synthesis(e.to_string()))?;
        Ok(Self { handlebars })
    }

    /// Render every executed step (steps without output are skipped)
    pub fn render(&self, steps: &[WorkflowStep]) -> WorkflowResult<String> {
        let completed: Vec<&WorkflowStep> =
            steps.iter().filter(|s| s.output_text.is_some()).collect();

        let sections = completed
            .iter()
            .enumerate()
            .map(|(i, step)| Section {
                separator: if i == 0 { "" } else { SECTION_SEPARATOR },
                title: step.agent.display_name(),
                output: step.output_text.as_deref().unwrap_or_default(),
            })
            .collect();

        let data = SynthesisData {
            sections,
            count: completed.len(),
            noun: if completed.len() == 1 { "agent" } else { "agents" },
            agent_list: completed
                .iter()
                .map(|s| s.agent.display_name())
                .collect::<Vec<_>>()
                .join(", "),
        };

        Ok(self.handlebars.render(SYNTHESIS_TEMPLATE_NAME, &data)?)
    }
}
