// All LLM prompt templates for the generation module.
// Reuses cross-cutting helpers from llm_client::prompts.

use crate::llm_client::prompts::{existing_content_xml, render, NO_EXISTING_CONTENT};
use crate::models::content::ContentPiece;
use crate::models::request::ContentRequestDetails;
use crate::models::user::BrandDetails;

/// Title prompt template. Fill `{idea_context}` before sending.
pub const TITLE_PROMPT_TEMPLATE: &str = "You are an AI assistant specialized in creating concise titles for content ideas. \
Your task is to generate a short, descriptive title (3-8 words) based on a given 'idea context' for personal brand content creation.

Here is the idea context provided by the user:
<idea_context>
{idea_context}
</idea_context>

Consider the following:
1. The title should capture the essence of the idea context in 3-8 words.
2. Ensure that you use the user's original words as much as possible.

Before providing your final title, work through the following process inside <title_creation_process> tags:
1. List key concepts and important phrases from the idea context.
2. Brainstorm 3-5 potential titles.
3. Evaluate each title based on clarity and relevance to the idea context.
4. Choose the most informative title or refine if necessary.

Example of the expected output format:

<title_creation_process>
[Your analysis and thought process here]
</title_creation_process>

<final_title>
[The final title here]
</final_title>

Remember, the final output must not contain any formatting or additional text.";

/// Brand summary prompt template.
/// Fill `{brand_details}` and `{existing_content}` before sending.
pub const BRAND_SUMMARY_PROMPT_TEMPLATE: &str = "You are an experienced branding specialist with expertise in social media personal branding. \
Your task is to analyze some details about a personal brand, including existing content, and to write a brand summary.

Personal brand details and existing content:
{brand_details}

{existing_content}

Consider the following steps:
1. Analyze the brand themes, identifying key concepts and how they are expressed.
2. Examine the tone of voice, noting specific language patterns and styles.
3. Break down the target audience characteristics and how the existing content resonates with them.
4. List the content goals and how they relate to brand and audience.
5. Identify key elements that set this brand apart.

Rules:
1. Write the summary in paragraphs separated by new lines, without any additional formatting.
2. Write the summary in an objective, neutral manner.
3. You must output only the brand summary text, without anything else.
";

/// Content generation prompt template. Fill `{brand_summary}`,
/// `{existing_content}`, `{idea_context}`, `{content_format}` and `{count}`.
pub const CONTENT_GENERATION_PROMPT_TEMPLATE: &str = "You are an experienced content creator specializing in social media content and personal branding. \
Your task is to analyze the personal brand of the user, brainstorm ideas that strongly resonate with the brand, \
and generate value-packed content that aligns with the user's established identity.

First, review the following brand summary:
<brand_summary>
{brand_summary}
</brand_summary>

Next, examine the following existing content of the brand:
{existing_content}

The ideas (and the content) must revolve around the context provided by the user:
<idea_context>{idea_context}</idea_context>

The content must be written in a specific format:
<content_format>{content_format}</content_format>

Before generating the ideas and the content, analyze all the provided information. \
Wrap your analysis with <analysis> tags inside your thinking block. Consider the following steps:
1. Analyze the brand summary and existing content, identifying: key themes and how they are expressed, \
tone of voice and specific language patterns, how the content resonates with the target audience, \
key elements that set this brand apart.
2. Brainstorm {count} fresh ideas, angles, or perspectives that strongly resonate with the brand, \
and briefly describe them. It is crucial that provided context is taken into consideration.
3. Evaluate how well the ideas align with the brand and refine if necessary.
4. Consider how to adapt the ideas to the requested content format. \
The existing pieces of content written in the same format serve as examples.

After you finished thinking, create {count} value-packed content pieces in the requested format. \
Ensure that each content piece:
- Delivers value
- Stays true to the brand's authenticity and tone of voice
- Resonates with the target audience

You must present each content piece in the following way:

<content_piece>
<idea>
[Describe the idea in 1-3 sentences]
</idea>
<content>
[Insert the actual content here]
</content>
</content_piece>

Wrap all content pieces with <new_content> tags.

Your final output must consist only of the generated content within (and including) the <new_content> tags. \
Do not repeat anything from your thinking process. Do not add any other additional text or formatting.";

pub fn build_title_prompt(idea_context: &str) -> String {
    render(TITLE_PROMPT_TEMPLATE, &[("idea_context", idea_context)])
}

pub fn build_brand_summary_prompt(
    brand_details: &BrandDetails,
    existing_content: &[ContentPiece],
) -> String {
    let details_xml = format!(
        "<brand_details>\n\
         <brand_themes>{}</brand_themes>\n\
         <tone_of_voice>{}</tone_of_voice>\n\
         <target_audience>{}</target_audience>\n\
         <content_goals>{}</content_goals>\n\
         </brand_details>",
        brand_details.brand_themes,
        brand_details.tone_of_voice,
        brand_details.target_audience,
        brand_details.content_goals,
    );

    render(
        BRAND_SUMMARY_PROMPT_TEMPLATE,
        &[
            ("brand_details", &details_xml),
            ("existing_content", &existing_content_xml(existing_content, None)),
        ],
    )
}

pub fn build_content_generation_prompt(
    brand_summary: &str,
    exemplars: &[ContentPiece],
    request: &ContentRequestDetails,
) -> String {
    let count = request.content_pieces_count.to_string();
    render(
        CONTENT_GENERATION_PROMPT_TEMPLATE,
        &[
            ("brand_summary", brand_summary),
            (
                "existing_content",
                &existing_content_xml(exemplars, Some(NO_EXISTING_CONTENT)),
            ),
            ("idea_context", &request.idea_context),
            ("content_format", &request.content_format),
            ("count", &count),
        ],
    )
}
