use crate::patients::Patient;

const INSTRUCTIONS: &str = "You are a nutrition assistant chatbot. Use the following patient information to provide personalized nutrition advice. Do not provide medical advice or diagnose conditions. If the patient asks for advice related to a health condition, refer them to a healthcare professional. Do not answer questions not related to nutrition.";

/// System prompt describing the patient, followed by retrieved knowledge
/// when there is any. Lines without content are left out.
pub fn build_system_prompt(patient: &Patient, context: &str) -> String {
    let mut lines = vec![
        INSTRUCTIONS.to_string(),
        format!(
            "The patient is a {} years old {}. Their name is {}.",
            patient.age, patient.gender, patient.name
        ),
    ];

    if let Some(goal) = patient.fitness_goal.as_deref().filter(|g| !g.is_empty()) {
        lines.push(format!("Their primary fitness goal is to {}.", goal));
    }

    let lists = [
        ("They have the following health conditions", &patient.health_conditions),
        ("They like the following foods", &patient.liked_foods),
        ("They dislike the following foods", &patient.disliked_foods),
        ("They are allergic to the following foods", &patient.food_allergies),
    ];
    for (lead, items) in lists {
        if !items.is_empty() {
            lines.push(format!("{}: {}.", lead, items.join(", ")));
        }
    }

    if !context.is_empty() {
        lines.push(format!(
            "The following information may be helpful in providing the best advice:\n\n{}",
            context
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patients::Gender;

    fn patient() -> Patient {
        Patient {
            id: "p1".to_string(),
            name: "Maya".to_string(),
            age: 29,
            gender: Gender::Female,
            fitness_goal: None,
            liked_foods: vec![],
            disliked_foods: vec![],
            food_allergies: vec![],
            health_conditions: vec![],
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn minimal_patient_gets_two_lines() {
        let prompt = build_system_prompt(&patient(), "");
        let lines: Vec<&str> = prompt.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("You are a nutrition assistant chatbot."));
        assert_eq!(lines[1], "The patient is a 29 years old female. Their name is Maya.");
    }

    #[test]
    fn includes_every_populated_attribute_in_order() {
        let mut p = patient();
        p.fitness_goal = Some("run a marathon".to_string());
        p.health_conditions = vec!["type 2 diabetes".to_string()];
        p.liked_foods = vec!["salmon".to_string(), "quinoa".to_string()];
        p.disliked_foods = vec!["okra".to_string()];
        p.food_allergies = vec!["shellfish".to_string()];

        let prompt = build_system_prompt(&p, "Section A\n\nSection B");

        let expected = [
            "Their primary fitness goal is to run a marathon.",
            "They have the following health conditions: type 2 diabetes.",
            "They like the following foods: salmon, quinoa.",
            "They dislike the following foods: okra.",
            "They are allergic to the following foods: shellfish.",
            "The following information may be helpful in providing the best advice:\n\nSection A\n\nSection B",
        ];
        let mut cursor = 0;
        for fragment in expected {
            let found = prompt[cursor..].find(fragment).expect(fragment);
            cursor += found + fragment.len();
        }
    }
}
