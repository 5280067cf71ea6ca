//! Static registry of document templates.
//!
//! Templates drive the RequiredFields verification check and the
//! label-anchored field lifting in the tesseract adapter. The set is
//! read-only for this subsystem, so it lives in code rather than a table.

use crate::models::{DocumentTemplate, DocumentType, FieldKind, TemplateField};

const W2_FIELDS: &[TemplateField] = &[
    TemplateField {
        name: "employee_name",
        kind: FieldKind::Text,
        required: true,
    },
    TemplateField {
        name: "employee_ssn",
        kind: FieldKind::Ssn,
        required: true,
    },
    TemplateField {
        name: "employer_name",
        kind: FieldKind::Text,
        required: true,
    },
    TemplateField {
        name: "employer_ein",
        kind: FieldKind::Text,
        required: false,
    },
    TemplateField {
        name: "wages",
        kind: FieldKind::Currency,
        required: true,
    },
    TemplateField {
        name: "federal_tax_withheld",
        kind: FieldKind::Currency,
        required: true,
    },
    TemplateField {
        name: "tax_year",
        kind: FieldKind::Number,
        required: false,
    },
];

const TAX_RETURN_FIELDS: &[TemplateField] = &[
    TemplateField {
        name: "filer_name",
        kind: FieldKind::Text,
        required: true,
    },
    TemplateField {
        name: "filer_ssn",
        kind: FieldKind::Ssn,
        required: true,
    },
    TemplateField {
        name: "filing_status",
        kind: FieldKind::Text,
        required: false,
    },
    TemplateField {
        name: "adjusted_gross_income",
        kind: FieldKind::Currency,
        required: true,
    },
    TemplateField {
        name: "total_tax",
        kind: FieldKind::Currency,
        required: false,
    },
    TemplateField {
        name: "tax_year",
        kind: FieldKind::Number,
        required: false,
    },
];

const BANK_STATEMENT_FIELDS: &[TemplateField] = &[
    TemplateField {
        name: "account_holder",
        kind: FieldKind::Text,
        required: true,
    },
    TemplateField {
        name: "statement_date",
        kind: FieldKind::Date,
        required: true,
    },
    TemplateField {
        name: "beginning_balance",
        kind: FieldKind::Currency,
        required: false,
    },
    TemplateField {
        name: "ending_balance",
        kind: FieldKind::Currency,
        required: true,
    },
];

const TRANSCRIPT_FIELDS: &[TemplateField] = &[
    TemplateField {
        name: "student_name",
        kind: FieldKind::Text,
        required: true,
    },
    TemplateField {
        name: "school_name",
        kind: FieldKind::Text,
        required: true,
    },
    TemplateField {
        name: "gpa",
        kind: FieldKind::Number,
        required: false,
    },
    TemplateField {
        name: "graduation_date",
        kind: FieldKind::Date,
        required: false,
    },
];

static TEMPLATES: &[DocumentTemplate] = &[
    DocumentTemplate {
        doc_type: DocumentType::W2,
        display_name: "W-2 Wage and Tax Statement",
        expected_fields: W2_FIELDS,
    },
    DocumentTemplate {
        doc_type: DocumentType::TaxReturn,
        display_name: "Federal Tax Return (1040)",
        expected_fields: TAX_RETURN_FIELDS,
    },
    DocumentTemplate {
        doc_type: DocumentType::BankStatement,
        display_name: "Bank Statement",
        expected_fields: BANK_STATEMENT_FIELDS,
    },
    DocumentTemplate {
        doc_type: DocumentType::Transcript,
        display_name: "Academic Transcript",
        expected_fields: TRANSCRIPT_FIELDS,
    },
];

/// All templates this deployment understands.
pub fn available_templates() -> &'static [DocumentTemplate] {
    TEMPLATES
}

/// The template for a document type. `Other` and `Unknown` have none.
pub fn template_for(doc_type: DocumentType) -> Option<&'static DocumentTemplate> {
    TEMPLATES.iter().find(|t| t.doc_type == doc_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_typed_document_has_a_template() {
        for dt in [
            DocumentType::W2,
            DocumentType::TaxReturn,
            DocumentType::BankStatement,
            DocumentType::Transcript,
        ] {
            assert!(template_for(dt).is_some(), "missing template for {:?}", dt);
        }
    }

    #[test]
    fn test_other_and_unknown_have_no_template() {
        assert!(template_for(DocumentType::Other).is_none());
        assert!(template_for(DocumentType::Unknown).is_none());
    }

    #[test]
    fn test_each_template_has_a_required_field() {
        for template in available_templates() {
            assert!(
                template.expected_fields.iter().any(|f| f.required),
                "{} has no required fields",
                template.display_name
            );
        }
    }

    #[test]
    fn test_field_names_are_unique_within_template() {
        for template in available_templates() {
            let mut names: Vec<&str> =
                template.expected_fields.iter().map(|f| f.name).collect();
            let total = names.len();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), total, "{} has duplicate fields", template.display_name);
        }
    }
}
