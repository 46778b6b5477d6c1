//! System prompt assembly.
//!
//! The system prompt teaches the model the directive syntax with the live
//! prefix substituted in, describes the available tools, and carries project
//! context (or, when explicit files are supplied, their contents instead —
//! in that mode the model is expected to answer from the given files, so the
//! filesystem tools and project scan are omitted).

use chrono::Local;

use crate::tools::TOOL_SPECS;

/// A file embedded verbatim into the prompt via `--file`.
pub struct FileContent {
    pub filename: String,
    pub content: String,
}

/// Assembles the system prompt for one conversation.
pub struct Builder {
    pub project: String,
    pub file_count: Option<usize>,
    pub first_files: Vec<String>,
    pub files_content: Vec<FileContent>,
    pub prefix: String,
    /// Replaces the default persona/instructions when set.
    pub custom_instructions: Option<String>,
    pub date: String,
}

const PERSONA: &str = "You are a 10x software engineer with exceptional problem-solving skills, \
attention to detail, and a deep understanding of software design principles. You will be given a \
question or task about a software project. Your job is to answer or solve that task while adhering \
to best practices and considering code quality, performance, security, and maintainability.

Your first task is to devise a plan for how you will solve this task. Generate a list of steps to \
perform. You can revise this list later as you learn new things along the way.

Generate all of the relevant information necessary to pass along to another software engineering \
assistant so that it can pick up and perform the next step in the instructions. That assistant \
will have no additional context besides what you provide so be sure to include all relevant \
information necessary to perform the next step.";

impl Builder {
    pub fn new(project: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            file_count: None,
            first_files: Vec::new(),
            files_content: Vec::new(),
            prefix: prefix.into(),
            custom_instructions: None,
            date: Local::now().format("%Y-%m-%d").to_string(),
        }
    }

    /// Project context and filesystem tools are only taught when the model
    /// is expected to explore the project itself.
    fn include_project_context(&self) -> bool {
        self.files_content.is_empty()
    }

    fn include_fs_tools(&self) -> bool {
        self.files_content.is_empty()
    }

    pub fn build(&self) -> String {
        let mut out = String::new();

        match &self.custom_instructions {
            Some(custom) => out.push_str(custom),
            None => out.push_str(PERSONA),
        }
        out.push_str("\n\n");

        if self.include_project_context() {
            self.push_context(&mut out);
        }
        if self.include_fs_tools() {
            self.push_tool_instructions(&mut out);
        }
        for file in &self.files_content {
            out.push_str(&format!(
                "<file>\n<filename>{}</filename>\n<filecontent>{}</filecontent>\n</file>\n",
                file.filename, file.content
            ));
        }

        out.push_str(
            "\n<additional rules>\nFiles should always end with a trailing newline.\n</additional rules>\n",
        );
        out.push_str(&format!("\nToday's date is {}\n", self.date));
        out
    }

    fn push_context(&self, out: &mut String) {
        out.push_str("<context>\n");
        if !self.project.is_empty() {
            out.push_str(&format!("project={}\n", self.project));
        }
        if !self.first_files.is_empty() {
            out.push_str("\nfirst 10 files in project:\n");
            for file in &self.first_files {
                out.push_str(file);
                out.push('\n');
            }
        }
        if let Some(count) = self.file_count {
            out.push_str(&format!("file_count={}\n", count));
        }
        out.push_str("</context>\n\n");
    }

    fn push_tool_instructions(&self, out: &mut String) {
        let p = &self.prefix;

        out.push_str(&format!(
            "In this environment, you can invoke tools using the following syntax:\n\
             {p},function,$FUNCTION_NAME\n\
             {p},parameter,$PARAM_NAME\n\
             $PARAM_VALUE\n\
             {p},end_parameter\n\
             {p},end_function\n\
             {p},invoke\n\n"
        ));
        out.push_str(&format!(
            "Each {p} directive must be at the start of a new line. You should stop after each \
             function call invocation to allow me to run the function and return the results to \
             you. You must include all fields in each line. The only values you should change are \
             the fields that start with '$'. You must terminate each parameter with end_parameter, \
             as well as the function with end_function. You must provide the '{p},invoke' line to \
             call the function.\n\n\
             You must provide the '{p},invoke' line to call the function!\n\n"
        ));

        out.push_str(
            "The response will be in the form:\n\
             <function_result>\n\
             <stdout>$STDOUT</stdout>\n\
             <stderr>$STDERR</stderr>\n\
             <exit_code>$EXIT_CODE</exit_code>\n\
             </function_result>\n\n\
             The available functions that you can invoke this way are:\n\n",
        );

        for spec in TOOL_SPECS {
            out.push_str(&format!("<function name=\"{}\">\n", spec.name));
            for (name, _) in spec.parameters {
                out.push_str(&format!("<parameter name=\"{}\"/>\n", name));
            }
            out.push_str(&format!("<description>{}</description>\n</function>\n\n", spec.description));
        }

        out.push_str(&format!(
            "IMPORTANT: When calling functions, you must follow this exact format:\n\n\
             1. Each directive must start with {p} at the beginning of a new line\n\
             2. Every parameter must be terminated with end_parameter\n\
             3. The function must be terminated with end_function\n\
             4. End with invoke to execute\n\n\
             Example of correct format:\n\
             {p},function,write_file\n\
             {p},parameter,filename\n\
             example.txt\n\
             {p},end_parameter\n\
             {p},parameter,content\n\
             Hello World\n\
             {p},end_parameter\n\
             {p},end_function\n\
             {p},invoke\n\n\
             Common mistakes to avoid:\n\
             - Missing end_parameter after each parameter\n\
             - Missing newlines between directives\n\
             - Incorrect order of directives\n\
             - Missing invoke at the end\n\n\
             The following validation rules must be followed:\n\
             1. Each parameter must have both its declaration and end_parameter. Every single \
             parameter must have an end_parameter line or the call will fail.\n\
             2. The function must have end_function\n\
             3. Must end with invoke\n\
             4. All directives must be properly aligned at the start of a line\n"
        ));
    }
}
