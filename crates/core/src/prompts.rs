pub const METADATA_SCHEMA: &str = r#"The output must be a single JSON object matching this schema:
{
  "candidate_id": integer,                 // the candidate ID from the input text
  "location_name": string | null,
  "positions": [string],
  "experience_years": number | null,       // >= 0
  "grade": "Intern" | "Junior" | "Middle" | "Senior" | "Lead" | "Head" | null,
  "hard_skills": [string],
  "domain_skills": [string],
  "performed_tasks": [string],
  "languages": [{"name": string, "level": "A1" | "A2" | "B1" | "B2" | "C1" | "C2" | "Native" | null}],
  "embedding_text": string                 // non-empty, no personal data
}
Return only the JSON object, with no text before or after it."#;

pub const EXTRACTION_SYSTEM: &str = r#"You are an HR, recruiting and information-extraction expert at a large bank.
Convert the candidate description into strictly valid JSON of type CandidateMetadata.

GENERAL RULES
- Use only facts from the résumé. Do not infer or invent data.
- Field names, order and structure must match the schema.
- embedding_text must NOT contain personal data: name, phone, email, links, birth dates.
- When data is missing use empty arrays or null, never made-up values.

STEP 1. ANALYSE the résumé: hard skills, industry and functional domains, performed
tasks, tools and standards, task complexity, actual work experience, education,
languages and proficiency.

STEP 2. FIELDS
candidate_id: the unique candidate identifier from the input text.
location_name: the candidate's location, or null when absent.
positions: the normalized desired position plus every common role that fits the
  candidate's skills, tasks, experience and tools, each with widespread synonyms and
  English/Russian equivalents, e.g. "Backend developer (Backend Engineer)",
  "QA engineer (QA Tester)", "Data Engineer". Avoid niche titles. With too little
  information, give only the desired position.
experience_years: total experience relevant to the desired position, in years, counted
  strictly from the résumé ("1 year 2 months" = 1.2, "8 months" = 0.7). Use 0.0 when
  there is none.
grade: Intern -> Junior -> Middle -> Senior -> Lead -> Head for the desired position,
  judged by tools, task complexity, autonomy and responsibility rather than raw tenure.
  Use null when the desired position is not IT-related.
hard_skills: concrete, verifiable skills: tools, software, systems, standards,
  methodologies, programming languages, regulations, equipment. Keep the résumé's names
  and add the established English or Russian equivalent. No soft skills.
domain_skills: industry and functional domains confirmed by the résumé.
performed_tasks: professional tasks the candidate actually performed.
languages: languages with normalized levels (A1-C2, Native).

STEP 3. embedding_text follows this template, adding synonyms and English equivalents
useful for semantic search:
Primary role: <role>.
Relevant positions: <normalized positions with synonyms>.
Total relevant experience: <X> years.
Key skills: <hard skills>.
Domains: <domains>.
Tasks: <typical tasks>.
Tools: <stack, technologies, software, platforms>.
Languages: <languages>.
Expertise summary: <2-3 dense factual sentences combining role, experience, domains,
key skills, tasks and relevant education. No generic praise, no verbatim copying.>

STEP 4. SELF-CHECK before answering: valid JSON, all fields present, no personal data,
positions normalized with synonyms, experience_years computed correctly, grade
consistent with tasks, embedding_text follows the template, nothing outside the JSON.
"#;

pub const REPAIR_SYSTEM: &str =
    "You repair JSON. Return a valid JSON object that strictly matches the schema below.";

pub fn extraction_user(resume_text: &str) -> String {
    format!(
        "Analyse the following résumé and extract structured data strictly by the rules:\n\n{resume_text}"
    )
}

pub fn repair_user(broken_output: &str) -> String {
    format!("Fix this text so that the result is a correct JSON object:\n{broken_output}")
}

pub fn evaluation_prompt(vacancy_description: &str, candidate_contexts: &[String]) -> String {
    format!(
        "Vacancy description:\n{vacancy_description}\n\n\
         Review the following candidates and score each one:\n\
         - Hard skills (technical skills): score from 1 to 10\n\
         - Domain skills (industry or specialization experience): score from 1 to 10\n\
         - Overall relevance to the vacancy: score from 1 to 10, taking total experience, \
         hard skills and domain into account\n\
         - An explanation of the overall relevance score\n\
         Return JSON: a list of objects with the fields name, phone, location, \
         hard_skills_score, domain_skills_score, relevance_score, relevance_explanation.\n\n\
         Candidates:\n{}",
        candidate_contexts.join("\n\n---\n\n")
    )
}
