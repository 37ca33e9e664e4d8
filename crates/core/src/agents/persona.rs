//! Persona tags.
//!
//! A persona is a capability tag on an agent. It only shapes prompts; every
//! persona runs through the same execution loop.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Persona {
    SystemArchitect,
    BackendDeveloper,
    FrontendDeveloper,
    QaEngineer,
    TechnicalWriter,
    Generalist,
    /// Any tag not recognised above, kept verbatim.
    Other(String),
}

impl Persona {
    /// Parse a persona tag.
    ///
    /// Matching ignores case and accepts `-`, `_` or spaces as separators.
    ///
    /// # Examples
    ///
    /// ```
    /// use ledit_core::agents::Persona;
    ///
    /// assert_eq!(Persona::from_tag("backend_developer"), Persona::BackendDeveloper);
    /// assert_eq!(Persona::from_tag("QA Engineer"), Persona::QaEngineer);
    /// assert_eq!(Persona::from_tag(""), Persona::Generalist);
    /// assert_eq!(Persona::from_tag("dba"), Persona::Other("dba".to_string()));
    /// ```
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.trim().to_lowercase().replace(['-', ' '], "_");

        match normalized.as_str() {
            "" | "general" | "generalist" | "developer" => Self::Generalist,
            "architect" | "system_architect" | "software_architect" => Self::SystemArchitect,
            "backend" | "backend_developer" | "backend_engineer" => Self::BackendDeveloper,
            "frontend" | "frontend_developer" | "frontend_engineer" => Self::FrontendDeveloper,
            "qa" | "qa_engineer" | "tester" | "test_engineer" => Self::QaEngineer,
            "writer" | "technical_writer" | "documentation" => Self::TechnicalWriter,
            _ => Self::Other(tag.trim().to_string()),
        }
    }

    /// Get a human-readable name for the persona.
    pub fn name(&self) -> &str {
        match self {
            Self::SystemArchitect => "System Architect",
            Self::BackendDeveloper => "Backend Developer",
            Self::FrontendDeveloper => "Frontend Developer",
            Self::QaEngineer => "QA Engineer",
            Self::TechnicalWriter => "Technical Writer",
            Self::Generalist => "Software Engineer",
            Self::Other(tag) => tag,
        }
    }

    /// One line telling the model what this persona cares about.
    pub fn focus(&self) -> &'static str {
        match self {
            Self::SystemArchitect => "Focus on structure, interfaces and design documents.",
            Self::BackendDeveloper => "Focus on server-side code, data access and APIs.",
            Self::FrontendDeveloper => "Focus on user interface code and client-side behaviour.",
            Self::QaEngineer => "Focus on tests, edge cases and verifying behaviour.",
            Self::TechnicalWriter => "Focus on clear, accurate documentation.",
            Self::Generalist | Self::Other(_) => {
                "Make the smallest change that fully solves the task."
            }
        }
    }
}
