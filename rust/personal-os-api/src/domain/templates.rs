//! Default markdown for each document kind, used when a document is first
//! materialized.

use super::entries::DocumentType;

/// Starting content for a document of the given kind.
#[must_use]
pub fn template_for(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Principles => include_str!("templates/principles.md"),
        DocumentType::NorthStar => include_str!("templates/north_star.md"),
        DocumentType::Memory => include_str!("templates/memory.md"),
        DocumentType::FrameworkAnnualReview => include_str!("templates/annual_review.md"),
        DocumentType::FrameworkVividVision => include_str!("templates/vivid_vision.md"),
        DocumentType::FrameworkIdealLifeCosting => {
            include_str!("templates/ideal_life_costing.md")
        }
        DocumentType::FrameworkLifeMap => include_str!("templates/life_map.md"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_template_starts_with_its_label() {
        for kind in DocumentType::ALL {
            let template = template_for(*kind);
            assert!(
                template.starts_with(&format!("# {}", kind.label())),
                "template for {kind} should open with its label"
            );
        }
    }
}
