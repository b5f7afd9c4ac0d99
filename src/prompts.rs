//! Prompt templates for every model call. Components format these; nothing
//! else in the crate builds prompt strings inline.

use crate::types::{BatchFinding, Draft, StyleGuide};

pub const ANALYST_SYSTEM: &str = "You are an expert writing style analyst. Analyze the provided \
social posts and return detailed insights in the requested format. Be specific and quantitative \
where possible.";

pub const SYNTHESIS_SYSTEM: &str = "You are an expert at synthesizing multi-dimensional writing \
style analyses into one cohesive, actionable profile. Focus on how structure, tone, and \
engagement work together to create a distinctive voice.";

pub const COMPOSER_SYSTEM: &str = "You are an expert social content creator. You generate posts \
that sound authentic and personal, matching the user's established writing style exactly. Avoid \
obvious AI-generated language patterns.";

pub const CRITIC_SYSTEM: &str = "You are an expert content analyst and writing critique \
specialist. You evaluate posts against the original instructions and the author's style guide, \
and you always return the exact JSON structure you are asked for.";

pub const RESEARCH_SYSTEM: &str = "You are a research specialist generating topic insights for \
social content creation. Provide industry context, trends, and supporting data points in a \
clear, organized form that can be dropped into a writing prompt.";

pub fn structural_analysis(batch_text: &str) -> String {
    format!(
        "Analyze the structural and formatting patterns in the following posts. Cover:\n\
         - sentence patterns (length, complexity)\n\
         - paragraph structure and typical length\n\
         - formatting (bullet points, line breaks, spacing)\n\
         - opening and closing patterns\n\n\
         Summarize the most consistent structural habits in a few short paragraphs.\n\n\
         POSTS:\n{}",
        batch_text
    )
}

pub fn tone_analysis(batch_text: &str) -> String {
    format!(
        "Analyze the tone, voice, and personality in the following posts. Cover:\n\
         - professional level and emotional tone\n\
         - first vs third person, personal anecdotes\n\
         - vocabulary complexity and energy level\n\
         - rhetorical devices: humor, sarcasm, irony, storytelling\n\n\
         Summarize the most consistent voice characteristics in a few short paragraphs.\n\n\
         POSTS:\n{}",
        batch_text
    )
}

pub fn engagement_analysis(batch_text: &str) -> String {
    format!(
        "Analyze how this writer engages their audience in the following posts. Cover:\n\
         - question usage and calls to action\n\
         - hashtag and emoji habits\n\
         - hooks, storytelling, and value delivery\n\
         - how they invite interaction\n\n\
         Summarize the most consistent engagement tactics in a few short paragraphs.\n\n\
         POSTS:\n{}",
        batch_text
    )
}

pub fn style_synthesis(findings: &[BatchFinding]) -> String {
    let mut prompt = String::from(
        "Below are style findings gathered from several batches of one writer's posts. \
         Synthesize them into a single reusable style guide.\n\n",
    );

    for finding in findings {
        prompt.push_str(&format!(
            "BATCH {} STRUCTURE:\n{}\n\nBATCH {} TONE:\n{}\n\nBATCH {} ENGAGEMENT:\n{}\n\n",
            finding.batch_index,
            finding.structure_notes,
            finding.batch_index,
            finding.tone_notes,
            finding.batch_index,
            finding.engagement_notes,
        ));
    }

    prompt.push_str(
        "Write a practical style guide with these sections:\n\
         1. TONE & VOICE: key characteristics, sentence length, common expressions, humor/sarcasm usage\n\
         2. STRUCTURE: how posts open, develop, and close\n\
         3. ENGAGEMENT: how the writer connects with readers\n\
         4. FORMATTING: hashtags, emojis, spacing patterns\n\
         5. OTHER: anything else distinctive\n\n\
         Start with \"WRITING STYLE GUIDE:\" and phrase everything as concrete instructions an \
         LLM can follow when writing in this person's voice. Concise but comprehensive.",
    );

    prompt
}

pub fn compose(
    instruction: &str,
    guide: &StyleGuide,
    examples: &[String],
    context: Option<&str>,
    max_post_chars: usize,
    max_hashtags: usize,
) -> String {
    let mut prompt = format!("WRITING STYLE GUIDE:\n{}\n\n", guide.text);

    if let Some(context) = context {
        prompt.push_str(&format!("BACKGROUND CONTEXT:\n{}\n\n", context));
    }

    if !examples.is_empty() {
        prompt.push_str("EXAMPLE POSTS (study these for voice and rhythm):\n");
        for (i, example) in examples.iter().enumerate() {
            prompt.push_str(&format!("\nExample {}:\n{}\n", i + 1, example));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "USER INSTRUCTIONS:\n{}\n\n\
         Write one post that follows the instructions, matches the style guide and examples, \
         and weaves in the background context naturally. Aim for at most {} characters and at \
         most {} hashtags. Return only the post text.",
        instruction, max_post_chars, max_hashtags
    ));

    prompt
}

pub fn refine(prior: &Draft, feedback: &str, instruction: &str, guide: &StyleGuide) -> String {
    format!(
        "WRITING STYLE GUIDE:\n{}\n\n\
         ORIGINAL INSTRUCTIONS:\n{}\n\n\
         PREVIOUS DRAFT (round {}):\n{}\n\n\
         FEEDBACK:\n{}\n\n\
         Revise the draft based on the feedback. Keep the same writing style and keep \
         honoring the original instructions. Return the complete revised post, not a diff.",
        guide.text, instruction, prior.round_number, prior.text, feedback
    )
}

pub fn critique(draft_text: &str, instruction: &str, guide: &StyleGuide) -> String {
    format!(
        "Evaluate this post against the original instructions and the author's style guide.\n\n\
         ORIGINAL INSTRUCTIONS:\n{}\n\n\
         STYLE GUIDE:\n{}\n\n\
         POST:\n{}\n\n\
         Score each dimension from 0 to 100 and list concrete improvements. Return exactly this \
         JSON object and nothing else:\n\
         {{\n\
           \"alignment_score\": <number>,\n\
           \"style_score\": <number>,\n\
           \"readability_score\": <number>,\n\
           \"recommendations\": [\"...\", \"...\"]\n\
         }}",
        instruction, guide.text, draft_text
    )
}

pub fn link_summary(url: &str, page_text: &str) -> String {
    format!(
        "Summarize the key information from this web page for use in a social post.\n\n\
         URL: {}\n\n\
         PAGE TEXT:\n{}\n\n\
         List the main themes, the strongest factual points, and one or two quotable lines. \
         Keep it under 200 words.",
        url, page_text
    )
}

pub fn research(instruction: &str, link_context: &str, search_results: Option<&str>) -> String {
    let mut prompt = format!(
        "Gather supporting insight for a social post.\n\nPOST INSTRUCTIONS:\n{}\n",
        instruction
    );

    if !link_context.is_empty() {
        prompt.push_str(&format!("\nLINKED CONTENT SUMMARIES:\n{}\n", link_context));
    }

    match search_results {
        Some(results) => prompt.push_str(&format!(
            "\nWEB SEARCH RESULTS:\n{}\n\n\
             Using the search results above, list current trends, supporting statistics, and \
             professional angles relevant to the instructions. Keep it under 300 words.",
            results
        )),
        None => prompt.push_str(
            "\nNo web search is available. Using your own knowledge, list relevant trends, \
             supporting data points, and professional angles for the instructions. Keep it \
             under 300 words.",
        ),
    }

    prompt
}
