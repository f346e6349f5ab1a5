//! Scripted financial assistant.
//!
//! The responder lower-cases the question and walks an ordered rule table;
//! the first rule whose predicate matches supplies the answer. Matching is
//! plain substring search, so "hi" also fires inside longer words.

use serde::Serialize;

pub const GREETING: &str = "Hello! I'm your financial assistant. I can help you track expenses, analyze your spending habits, or answer questions about your finances. How can I help you today?";

pub struct Rule {
    pub name: &'static str,
    matches: fn(&str) -> bool,
    pub response: &'static str,
}

impl Rule {
    pub fn matches(&self, lower_question: &str) -> bool {
        (self.matches)(lower_question)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    /// Name of the rule that answered, `None` for the fallback.
    pub rule: Option<&'static str>,
    pub text: String,
}

fn contains_any(q: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| q.contains(n))
}

fn asks_definition(q: &str) -> bool {
    contains_any(q, &["what is", "define", "meaning", "means"])
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "define_expense",
        matches: |q| asks_definition(q) && q.contains("expense"),
        response: "Expenses are costs or charges you incur to manage your daily life, business, or specific activities. These are the outflows of money from your account, like bills, groceries, rent, or entertainment costs that you pay for.",
    },
    Rule {
        name: "define_budget",
        matches: |q| asks_definition(q) && q.contains("budget"),
        response: "A budget is a financial plan that outlines your expected income and expenses for a specific period. It's a tool to help you allocate your money efficiently and ensure you don't spend more than you earn.",
    },
    Rule {
        name: "define_debt",
        matches: |q| asks_definition(q) && q.contains("debt"),
        response: "Debt refers to money that you've borrowed from a lender with the agreement to pay it back, usually with interest. Common forms include credit cards, mortgages, student loans, and personal loans.",
    },
    Rule {
        name: "define_interest",
        matches: |q| asks_definition(q) && q.contains("interest"),
        response: "Interest is the cost of borrowing money, typically expressed as a percentage rate. When you borrow, you pay interest; when you save or invest, you may earn interest on your money.",
    },
    Rule {
        name: "define_investment",
        matches: |q| asks_definition(q) && q.contains("investment"),
        response: "An investment is an asset purchased with the expectation that it will generate income or appreciate in value over time. Investments can include stocks, bonds, real estate, or starting a business.",
    },
    Rule {
        name: "define_credit_score",
        matches: |q| asks_definition(q) && q.contains("credit score"),
        response: "A credit score is a numerical rating that represents your creditworthiness based on your credit history. Higher scores (usually on a scale of 300-850) indicate lower risk to lenders and can help you secure better loan terms.",
    },
    Rule {
        name: "expense_report",
        matches: |q| q.contains("report") && q.contains("expense"),
        response: "Based on your financial data, I can see that your spending this month totals $2,450. Your largest expenses are housing (35%), transportation (20%), food (15%), and utilities (10%). Compared to last month, your food expenses have increased by 12%, while your entertainment costs decreased by 8%.",
    },
    Rule {
        name: "savings",
        matches: |q| contains_any(q, &["save", "saving"]),
        response: "Based on your current spending patterns, I see opportunities to increase your savings. You're currently spending about $320 monthly on dining out and food delivery. Reducing this by half could add $160 to your savings each month. Additionally, your subscription services total $95/month - reviewing these for services you don't frequently use could further increase your savings.",
    },
    Rule {
        name: "budgeting",
        matches: |q| contains_any(q, &["budget", "spending"]),
        response: "Looking at your financial data, I recommend allocating your budget as follows: 35% for housing, 15% for food, 15% for transportation, 10% for utilities, 15% for savings and debt repayment, and 10% for discretionary spending. Based on your income, this would mean approximately $1,750 for housing, $750 for food, and so on.",
    },
    Rule {
        name: "investing",
        matches: |q| contains_any(q, &["invest", "stocks"]),
        response: "Based on your financial profile, a diversified investment approach might work well for you. Consider allocating 60% to broad market index funds, 20% to bond funds (for stability), 10% to international stocks (for geographic diversification), and 10% to individual stocks or sectors you understand well. Remember that all investments carry risk, and this isn't personalized investment advice.",
    },
    Rule {
        name: "debt",
        matches: |q| contains_any(q, &["debt", "loan"]),
        response: "Looking at your current debt profile, prioritizing payments on your highest interest debt (likely your credit card at 18.9% APR) would be most efficient. By increasing your monthly payment on this account by just $100, you could save approximately $480 in interest and pay it off 8 months sooner.",
    },
    Rule {
        name: "greeting",
        matches: |q| contains_any(q, &["hello", "hi", "hey"]),
        response: "Hello! I'm your AI financial assistant. How can I help with your finances today? I can analyze expenses, help with budgeting, provide savings tips, or answer financial questions.",
    },
    Rule {
        name: "help",
        matches: |q| contains_any(q, &["help", "what can you do", "capabilities"]),
        response: "As your financial assistant, I can help you with expense tracking and analysis, budgeting advice, debt management strategies, savings tips, investment guidance (non-advisory), retirement planning basics, and answering general financial questions. What specific area would you like to focus on today?",
    },
];

/// Answer a question. Never fails; unknown questions get a fallback that echoes them.
pub fn respond(question: &str) -> Reply {
    let lower = question.to_lowercase();

    match RULES.iter().find(|rule| rule.matches(&lower)) {
        Some(rule) => Reply {
            rule: Some(rule.name),
            text: rule.response.to_string(),
        },
        None => Reply {
            rule: None,
            text: format!(
                "I'm not sure I fully understand your question about '{}'. Could you provide more details or rephrase it? I'm here to help with expense tracking, budgeting, savings strategies, debt management, and other financial matters.",
                question
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_for(question: &str) -> Option<&'static str> {
        respond(question).rule
    }

    #[test]
    fn test_definition_of_budget() {
        let reply = respond("What is a budget?");
        assert_eq!(reply.rule, Some("define_budget"));
        assert!(reply.text.starts_with("A budget is a financial plan"));
    }

    #[test]
    fn test_definitions_take_priority() {
        assert_eq!(rule_for("Define debt"), Some("define_debt"));
        assert_eq!(rule_for("what is my credit score"), Some("define_credit_score"));
        assert_eq!(rule_for("What is an expense report?"), Some("define_expense"));
    }

    #[test]
    fn test_definition_without_known_subject_falls_through() {
        assert_eq!(rule_for("what is the best way to save"), Some("savings"));
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(rule_for("Show me an expense report"), Some("expense_report"));
        assert_eq!(rule_for("How do I save on my budget?"), Some("savings"));
        assert_eq!(rule_for("Review my spending"), Some("budgeting"));
        assert_eq!(rule_for("Should I buy stocks?"), Some("investing"));
        assert_eq!(rule_for("Pay off my car loan"), Some("debt"));
        assert_eq!(rule_for("Hey there"), Some("greeting"));
        assert_eq!(rule_for("What can you do?"), Some("help"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(rule_for("HELLO"), Some("greeting"));
    }

    #[test]
    fn test_fallback_echoes_question() {
        let reply = respond("Quantum flux?");
        assert_eq!(reply.rule, None);
        assert!(reply.text.contains("your question about 'Quantum flux?'"));
    }
}
