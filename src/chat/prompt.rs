//! Grounded prompt assembly.

use crate::search::SearchHit;

/// Separator placed between formatted sources.
pub const SOURCE_SEPARATOR: &str = "=================\n";

const INSTRUCTIONS: &str = "\
You are an AI assistant that helps users research questions using the information provided.
Follow these instructions when answering.

Answer the question using only the information in the sources below.
Do not produce an answer of your own without using the sources.
If the sources do not contain enough information, answer \"I don't know\".
If the answer covers several points, use bullet points.
If the answer is a single line, do not use bullet points.
If the answer is longer than three sentences, summarize it.
At the end of the answer, on a new line, add the file name and URL of the most relevant source.
Format the file name as 'Source: <file name>'.
Format the URL as '[<URL>]' without the text 'URL: '.
Use '[' and ']' only to format the URL.

That is all.
";

/// Render retrieved chunks as `File: .., Content: .., URL: ..` entries.
pub fn format_sources(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "File: {}, Content: {}, URL: {}",
                hit.title, hit.chunk, hit.url
            )
        })
        .collect::<Vec<_>>()
        .join(SOURCE_SEPARATOR)
}

/// Fill the grounded prompt template with the user query and formatted sources.
pub fn grounded_prompt(query: &str, sources: &str) -> String {
    format!("{INSTRUCTIONS}\nQuestion: {query}\nSources:\n{sources}\n")
}
