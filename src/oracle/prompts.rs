// src/oracle/prompts.rs

// Schema descriptions embedded in the prompts. The oracle is asked for
// JSON matching these shapes; replies are still validated before use.
pub const EXPECTED_TOC_OUTPUT: &str = r#"
            {
                "section_name": {
                    "page_number": int,
                    "subsections": {
                        "subsection_name": int,
                        "subsection_name2": int
                    }
                },
                "section_name2": {
                    "page_number": int,
                    "subsections": {
                        "subsection_name": int
                    }
                }
            }
"#;

pub const EXPECTED_SUBJECT_OUTPUT: &str = "{subsection_name: [start_page_number, end_page_number], subsection_name2: [start_page_number, end_page_number]}";

/// Prompt asking the oracle to transcribe a table-of-contents page into a
/// section/subsection -> page-number mapping.
pub fn toc_prompt(device: &str, file_type: &str, dest_type: &str) -> String {
    format!(
        "This {file_type} depicts the table of contents from a user manual for a {device}.\n\
         **Task:**\n\n\
         Extract the section and subsection names, along with their corresponding page numbers, from the file.\n\
         Make sure the returned section names are in snakecase and all lowercase.\n\n\
         **Output Format:**\n\n\
         Provide the results as a {dest_type} object with the following structure:\n\n\
         ```json\n{expected}\n```",
        file_type = file_type,
        device = device,
        dest_type = dest_type,
        expected = EXPECTED_TOC_OUTPUT,
    )
}

/// Prompt asking the oracle which subsections of an already-resolved span
/// mapping are relevant to a free-text subject of interest.
pub fn subject_prompt(
    device: &str,
    file_type: &str,
    dest_type: &str,
    subject_of_interest: &str,
) -> String {
    format!(
        "This is a table of contents {file_type} file for a {device} user manual.\n\
         **Task:**\n\n\
         Extract the relevant subsections you think might help find details regarding \
         {subject} of this {device} from the file.\n\
         Make sure the returned subsection names are in snakecase and all lowercase.\n\n\
         **Output Format:**\n\n\
         Provide the results as a {dest_type} object with the following structure:\n\n\
         ```json\n{expected}\n```",
        file_type = file_type,
        device = device,
        dest_type = dest_type,
        subject = subject_of_interest,
        expected = EXPECTED_SUBJECT_OUTPUT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toc_prompt_interpolates_device_and_file_type() {
        let prompt = toc_prompt("Dishwasher", "image", "JSON");
        assert!(prompt.contains("user manual for a Dishwasher"));
        assert!(prompt.starts_with("This image depicts"));
        assert!(prompt.contains("as a JSON object"));
        assert!(prompt.contains("page_number"));
    }

    #[test]
    fn test_subject_prompt_interpolates_subject() {
        let prompt = subject_prompt("Dishwasher", "json", "JSON", "troubleshooting");
        assert!(prompt.contains("regarding troubleshooting of this Dishwasher"));
        assert!(prompt.contains("as a JSON object"));
        assert!(prompt.contains("start_page_number"));
    }
}
