use serde::Serialize;

/// Which of the two upload slots a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum DocumentRole {
    Student,
    Key,
}

impl DocumentRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            DocumentRole::Student => "student",
            DocumentRole::Key => "key",
        }
    }

    pub(crate) fn display_name(self) -> &'static str {
        match self {
            DocumentRole::Student => "Student sheet",
            DocumentRole::Key => "Answer key",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(DocumentRole::Student),
            "key" => Some(DocumentRole::Key),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-selected document: raw bytes plus the metadata the browser
/// declared for it. Content is opaque here; nothing is validated until the
/// grading run tries to decode it.
#[derive(Debug, Clone)]
pub(crate) struct UploadSlot {
    pub(crate) bytes: Vec<u8>,
    pub(crate) filename: String,
    pub(crate) content_type: String,
}

/// Two-slot upload state for a session. Selecting a document for a role
/// replaces whatever was there; there is no removal affordance, slots live
/// as long as the session does.
#[derive(Debug, Default)]
pub(crate) struct IntakeController {
    student: Option<UploadSlot>,
    key: Option<UploadSlot>,
}

impl IntakeController {
    /// Stores the document and returns the acknowledgment shown to the user.
    pub(crate) fn set_document(&mut self, role: DocumentRole, slot: UploadSlot) -> String {
        let ack = format!("{} uploaded: {}", role.display_name(), slot.filename);
        match role {
            DocumentRole::Student => self.student = Some(slot),
            DocumentRole::Key => self.key = Some(slot),
        }
        ack
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.student.is_some() && self.key.is_some()
    }

    pub(crate) fn slot(&self, role: DocumentRole) -> Option<&UploadSlot> {
        match role {
            DocumentRole::Student => self.student.as_ref(),
            DocumentRole::Key => self.key.as_ref(),
        }
    }

    /// Both slots cloned out for a grading run, or `None` while either is
    /// still missing.
    pub(crate) fn both_slots(&self) -> Option<(UploadSlot, UploadSlot)> {
        match (&self.student, &self.key) {
            (Some(student), Some(key)) => Some((student.clone(), key.clone())),
            _ => None,
        }
    }
}
