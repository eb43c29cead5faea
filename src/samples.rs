//! Built-in sample corpus.
//!
//! Seeds the corpus directory with default files for any that are absent,
//! so a fresh checkout answers questions on its first run. Existing files
//! are never overwritten.

use std::path::{Path, PathBuf};

use serde_json::json;

const CAREERS_FOR_WOMEN: &str = "
# Career Opportunities for Women in India

## Technology Careers
- Software Development
- Data Science and Analytics
- Cybersecurity
- UI/UX Design
- Digital Marketing

## Healthcare Careers
- Nursing
- Medical Technicians
- Pharmacists
- Healthcare Administration

## Education Careers
- Teaching (all levels)
- Educational Administration
- Online Education
- Special Education

## Business and Finance
- Accounting
- Financial Analysis
- Banking
- Human Resources
";

const WOMEN_EMPOWERMENT: &str = "
# Women Empowerment Initiatives in India

## Educational Initiatives
- Beti Bachao, Beti Padhao (Save the girl child, educate the girl child)
- National Program for Education of Girls at Elementary Level
- Kasturba Gandhi Balika Vidyalaya (KGBV)

## Financial Empowerment Programs
- Mahila E-Haat (Online marketplace for women entrepreneurs)
- Stand Up India Scheme (Loans for women entrepreneurs)
- Mahila Shakti Kendra (Empowerment through community participation)
- Rashtriya Mahila Kosh (National Credit Fund for Women)
- MUDRA Scheme (Small loans for micro-enterprises)
";

fn job_listings() -> serde_json::Value {
    json!([
        {
            "id": "job1",
            "title": "Software Developer",
            "company": "TechWomen Inc.",
            "location": "Bangalore, Remote",
            "description": "Entry-level software development position with flexible hours, ideal for women returning to work.",
            "requirements": "Basic programming skills, willingness to learn",
            "salary": "₹5,00,000 - ₹8,00,000 per annum",
            "apply_link": "https://example.com/apply/job1",
            "posted_date": "2025-04-10",
            "women_friendly_benefits": ["Remote work options", "Flexible hours", "Maternity benefits"]
        },
        {
            "id": "job2",
            "title": "Content Writer",
            "company": "CreativeMinds",
            "location": "Delhi, Hybrid",
            "description": "Content creation role with part-time options available.",
            "requirements": "Good writing skills, creativity",
            "salary": "₹4,00,000 - ₹6,00,000 per annum",
            "apply_link": "https://example.com/apply/job2",
            "posted_date": "2025-04-15",
            "women_friendly_benefits": ["Part-time options", "Work from home days"]
        }
    ])
}

fn community_events() -> serde_json::Value {
    json!([
        {
            "id": "event1",
            "title": "Women in Tech Conference",
            "organizer": "TechWomen Association",
            "location": "Bangalore",
            "online": true,
            "date": "2025-05-15",
            "time": "10:00 AM - 4:00 PM",
            "description": "Conference focusing on career opportunities for women in technology",
            "registration_link": "https://example.com/register/event1",
            "is_free": true
        },
        {
            "id": "event2",
            "title": "Resume Building Workshop",
            "organizer": "Career Forward",
            "location": "Delhi",
            "online": false,
            "date": "2025-05-20",
            "time": "2:00 PM - 5:00 PM",
            "description": "Learn how to create an impactful resume that stands out to employers",
            "registration_link": "https://example.com/register/event2",
            "is_free": true
        }
    ])
}

fn mentorship_programs() -> serde_json::Value {
    json!([
        {
            "id": "mentor1",
            "title": "Tech Career Mentorship",
            "organization": "Women in Tech India",
            "duration": "3 months",
            "format": "Online, 1 hour per week",
            "description": "One-on-one mentorship for women entering the technology field",
            "mentor_expertise": ["Software Development", "Product Management", "Data Science"],
            "application_deadline": "2025-05-30",
            "application_link": "https://example.com/apply/mentor1"
        },
        {
            "id": "mentor2",
            "title": "Women Entrepreneurs Mentorship",
            "organization": "StartUp India Women's Wing",
            "duration": "6 months",
            "format": "Hybrid (online and in-person), 2 hours per week",
            "description": "Guidance for women starting their own businesses",
            "mentor_expertise": ["Business Planning", "Marketing", "Finance", "Operations"],
            "application_deadline": "2025-06-15",
            "application_link": "https://example.com/apply/mentor2"
        }
    ])
}

/// File name and content of every built-in sample.
fn samples() -> Vec<(&'static str, String)> {
    let pretty = |v: serde_json::Value| serde_json::to_string_pretty(&v).unwrap_or_default();
    vec![
        ("careers_for_women.txt", CAREERS_FOR_WOMEN.to_string()),
        ("job_listings.json", pretty(job_listings())),
        ("community_events.json", pretty(community_events())),
        ("mentorship_programs.json", pretty(mentorship_programs())),
        ("women_empowerment.txt", WOMEN_EMPOWERMENT.to_string()),
    ]
}

/// Write each missing sample file into `root`. Returns the paths created.
///
/// A failed write is logged and skipped; seeding never aborts loading.
pub fn seed_missing(root: &Path) -> Vec<PathBuf> {
    if let Err(e) = std::fs::create_dir_all(root) {
        tracing::error!(root = %root.display(), error = %e, "cannot create corpus directory");
        return Vec::new();
    }

    let mut created = Vec::new();
    for (name, content) in samples() {
        let path = root.join(name);
        if path.exists() {
            continue;
        }
        match std::fs::write(&path, content) {
            Ok(()) => {
                tracing::info!(file = name, "created sample file");
                created.push(path);
            }
            Err(e) => tracing::error!(file = name, error = %e, "failed to create sample file"),
        }
    }
    created
}
