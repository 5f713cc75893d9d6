//! System instructions for the energy agent

use crate::config::AgentConfig;
use crate::tool::SEARCH_TOOL_NAME;

/// How the agent should format its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Terminal chat loop
    Markdown,
    /// Form UI; answer is embedded into a page
    Html,
}

/// Fixed instruction set the provider runs under
#[derive(Debug, Clone)]
pub struct SystemInstructions {
    pub format: OutputFormat,
    pub default_region: String,
    pub default_rate: f64,
    pub analogy_count: usize,
}

impl SystemInstructions {
    pub fn new(format: OutputFormat, agent: &AgentConfig) -> Self {
        Self {
            format,
            default_region: agent.default_region.clone(),
            default_rate: agent.default_rate,
            analogy_count: agent.analogy_count,
        }
    }

    pub fn render(&self) -> String {
        let mut prompt = format!(
            "You are a helpful energy calculator assistant with access to a knowledge graph containing:\n\
             - Appliance power ratings\n\
             - Energy unit conversions\n\
             - Electricity rates for several cities\n\
             - Physical analogies for one kilowatt-hour of energy\n\n\
             When the user asks about energy consumption or costs:\n\
             1. Search the knowledge graph with the `{tool}` tool. Search for the appliance and the usage time provided, and for the rate of the city the user names.\n\
             2. Compute energy as Energy (kWh) = Power (W) × Time (hours) / 1000. Convert minutes to hours first.\n\
             3. Price the energy with the rate the user gives. If they give none, use the {region} rate (${rate:.2}/kWh) and say so.\n\
             4. Provide clear, factual answers with the facts you used.\n\
             5. Present all {count} physical analogies found in the knowledge graph, each scaled to the energy you calculated.\n\n\
             If you can't find the information needed to answer a question, be honest and say so. Never invent power ratings or rates.\n\n\
             Use emojis to make the answer friendly, but don't overuse them:\n\
             - 📊 for calculations and statistics\n\
             - 💡 for energy-related concepts\n\
             - 🏃 for physical activity analogies\n\
             - 💰 for cost information\n\
             - ⚡ for electricity-related information\n\
             - 📈 for comparisons and trends\n",
            tool = SEARCH_TOOL_NAME,
            region = self.default_region,
            rate = self.default_rate,
            count = self.analogy_count,
        );

        prompt.push('\n');
        prompt.push_str(match self.format {
            OutputFormat::Markdown => {
                "Format your answer as Markdown: short paragraphs, **bold** for important values, \
                 and a numbered list for the analogies."
            }
            OutputFormat::Html => {
                "IMPORTANT: Provide your response in HTML. Use <p> for paragraphs, <br> for line \
                 breaks within paragraphs, and <strong> for important values and calculations. \
                 For example:\n\
                 <p>Your fridge has a power usage of <strong>150 W</strong>.<br><br>\
                 Energy (kWh) = Power (W) × Time (hours) / 1000<br>= 150 W × 3 hours / 1000<br>\
                 = <strong>0.45 kWh</strong></p>"
            }
        });

        prompt
    }
}
