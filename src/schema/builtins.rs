//! Built-in financial fact-find node types.
//!
//! Each function returns one node type with its fields and collection rule.
//! Totals are always derived from portfolio fields and never asked directly.

use serde_json::json;

use super::types::{CollectionSpec, DetailSubfield, FieldDef, NodeType, Operator};

/// Age, employment and relationship status.
pub fn personal() -> NodeType {
    NodeType::new(
        "Personal",
        "Personal details that drive planning horizons",
        vec![
            FieldDef::new("age", "Age in years"),
            FieldDef::new("occupation", "Current occupation"),
            FieldDef::new(
                "employment_type",
                "Type of employment (full_time, part_time, casual, contractor, self_employed, unemployed, retired)",
            ),
            FieldDef::new(
                "marital_status",
                "Marital status (single, married, divorced, widowed)",
            ),
            FieldDef::new(
                "health_conditions",
                "Health conditions affecting financial planning",
            ),
        ],
        CollectionSpec::required(&["age", "employment_type", "marital_status"]),
    )
}

/// Spouse financial details; relationship status lives on Personal.
pub fn marriage() -> NodeType {
    NodeType::new(
        "Marriage",
        "Spouse financial details for household planning",
        vec![
            FieldDef::new("spouse_age", "Spouse age (for retirement planning timeline)"),
            FieldDef::new(
                "spouse_employment_type",
                "Spouse employment type (full_time, part_time, self_employed, etc.)",
            ),
            FieldDef::new("spouse_income_annual", "Spouse annual income"),
        ],
        CollectionSpec::any_of(&["spouse_age", "spouse_employment_type", "spouse_income_annual"]),
    )
}

/// Children and parent support.
pub fn dependents() -> NodeType {
    NodeType::new(
        "Dependents",
        "Children and parents who depend on the household financially",
        vec![
            FieldDef::new("number_of_children", "Number of children"),
            FieldDef::new(
                "children_ages",
                "Ages of children (for education planning timeline)",
            ),
            FieldDef::new(
                "annual_education_cost",
                "Total annual education expenses for all children",
            ),
            FieldDef::new(
                "child_pathway",
                "Child education/work pathway (school, planning_uni, uni, apprenticeship, work, other, unknown)",
            ),
            FieldDef::new(
                "education_funding_preference",
                "Preference for education funding: hecs_help, parent_funded, mixed or unsure",
            ),
            FieldDef::new(
                "supporting_parents",
                "Are you financially supporting parents?",
            ),
            FieldDef::new(
                "monthly_parent_support",
                "Monthly financial support provided to parents",
            ),
        ],
        CollectionSpec::required(&["number_of_children", "supporting_parents"])
            .with_rule(
                "number_of_children",
                Operator::Gt,
                json!(0),
                &["children_ages", "child_pathway"],
            )
            .with_rule(
                "child_pathway",
                Operator::In,
                json!(["planning_uni", "uni"]),
                &["education_funding_preference"],
            ),
    )
}

/// Income streams keyed by income type.
pub fn income() -> NodeType {
    NodeType::new(
        "Income",
        "Annual income by source",
        vec![
            FieldDef::portfolio(
                "income_streams_annual",
                "Annual income by source type (salary, rental_income, dividend_income, etc.) mapped to the annual amount",
            ),
            FieldDef::new("primary_income_type", "Primary/main source of income"),
            FieldDef::new("is_stable", "Is the primary income stable?"),
        ],
        CollectionSpec::required(&["income_streams_annual"]),
    )
}

/// Monthly spending by category.
pub fn expenses() -> NodeType {
    NodeType::new(
        "Expenses",
        "Monthly expenses by category",
        vec![FieldDef::portfolio(
            "monthly_expenses",
            "Monthly expenses by category: rent_mortgage, utilities, food, transport, insurance, education, entertainment, childcare, health, other",
        )],
        CollectionSpec::required(&["monthly_expenses"]),
    )
}

/// Liquid savings and emergency buffer.
pub fn savings() -> NodeType {
    NodeType::new(
        "Savings",
        "Liquid savings and emergency fund coverage",
        vec![
            FieldDef::new(
                "total_savings",
                "Total liquid savings (bank accounts, cash, emergency fund combined)",
            ),
            FieldDef::new(
                "emergency_fund_months",
                "Emergency fund coverage in months of expenses",
            ),
        ],
        CollectionSpec::any_of(&["total_savings", "emergency_fund_months"]),
    )
}

pub fn assets() -> NodeType {
    NodeType::new(
        "Assets",
        "Assets by category and current value",
        vec![
            FieldDef::new("has_property", "Do you own property?"),
            FieldDef::portfolio(
                "asset_current_amount",
                "Current value by asset category (property, cash, shares, super, vehicles, other)",
            ),
        ],
        CollectionSpec::required(&["asset_current_amount"]),
    )
}

/// Debts keyed by liability type, with per-debt follow-up details.
pub fn loan() -> NodeType {
    NodeType::new(
        "Loan",
        "Loans and debts by type",
        vec![
            FieldDef::new("has_debt", "Do you have any outstanding loans or debts?"),
            FieldDef::portfolio(
                "liabilities",
                "Debts by liability type (home_loan, investment_loan, car_loan, personal_loan, credit_card, hecs_help, other)",
            ),
        ],
        CollectionSpec::required(&["liabilities"]).with_details(
            "liabilities",
            vec![
                DetailSubfield::new("outstanding_amount", "Outstanding balance"),
                DetailSubfield::new("monthly_payment", "Monthly repayment"),
                DetailSubfield::new("interest_rate", "Interest rate (annual, as a percentage)"),
                DetailSubfield::new("remaining_term_months", "Remaining loan term in months"),
                DetailSubfield::new(
                    "repayment_type",
                    "Repayment type (principal_and_interest or interest_only)",
                ),
            ],
        ),
    )
}

/// Insurance cover keyed by insurance type.
pub fn insurance() -> NodeType {
    NodeType::new(
        "Insurance",
        "Insurance cover held by the household",
        vec![
            FieldDef::portfolio(
                "coverages",
                "Insurance cover by type (life, tpd, income_protection, trauma, private_health, home, contents, car, landlord)",
            ),
            FieldDef::new("has_life_insurance", "Do you have life insurance coverage?"),
            FieldDef::new("has_income_protection", "Do you have income protection insurance?"),
            FieldDef::new("has_private_health", "Do you have private health insurance?"),
        ],
        CollectionSpec::required(&["coverages"]).with_details(
            "coverages",
            vec![
                DetailSubfield::new(
                    "covered_person",
                    "Who is covered (self, spouse, joint, family)",
                ),
                DetailSubfield::new(
                    "held_through",
                    "How the cover is held (super, employer, personal)",
                ),
                DetailSubfield::new("coverage_amount", "Sum insured").only_for(&[
                    "life",
                    "tpd",
                    "income_protection",
                    "trauma",
                    "home",
                    "contents",
                    "car",
                    "landlord",
                ]),
                DetailSubfield::new("premium_amount", "Premium amount"),
                DetailSubfield::new(
                    "premium_frequency",
                    "Premium frequency (weekly, fortnightly, monthly, annually)",
                ),
                DetailSubfield::new("waiting_period_weeks", "Waiting period in weeks")
                    .only_for(&["income_protection"]),
                DetailSubfield::new("benefit_period_months", "Benefit period in months")
                    .only_for(&["income_protection"]),
                DetailSubfield::new("excess_amount", "Excess payable on a claim")
                    .only_for(&["private_health", "home", "contents", "car"]),
            ],
        ),
    )
}

/// Superannuation position.
pub fn retirement() -> NodeType {
    NodeType::new(
        "Retirement",
        "Superannuation and retirement targets",
        vec![
            FieldDef::new("super_balance", "Current superannuation balance"),
            FieldDef::new("super_fund", "Super fund name"),
            FieldDef::new(
                "employer_contribution_rate",
                "Employer contribution rate (as decimal, e.g. 0.115)",
            ),
            FieldDef::new("salary_sacrifice_monthly", "Monthly salary sacrifice amount"),
            FieldDef::new("spouse_super_balance", "Spouse's superannuation balance"),
            FieldDef::new("target_retirement_age", "Target retirement age"),
        ],
        CollectionSpec::required(&["super_balance"]),
    )
}

/// Every built-in node type.
pub fn all() -> Vec<NodeType> {
    vec![
        personal(),
        marriage(),
        dependents(),
        income(),
        expenses(),
        savings(),
        assets(),
        loan(),
        insurance(),
        retirement(),
    ]
}

/// Hand-written open questions for the primary portfolio fields.
pub fn primary_question(node: &str, field: &str) -> Option<&'static str> {
    let text = match (node, field) {
        ("Income", "income_streams_annual") => {
            "Can you tell me your main income sources and roughly how much you receive from each per year? \
             For example: salary, rental income, dividends, interest, or anything else."
        }
        ("Expenses", "monthly_expenses") => {
            "Roughly what are your monthly expenses? \
             For example: housing, utilities, groceries, transport, insurance, and anything else major."
        }
        ("Savings", "total_savings") | ("Savings", "emergency_fund_months") => {
            "To understand your cash buffer, roughly how much do you have in liquid savings \
             (bank accounts, cash, emergency fund), or about how many months of expenses would that cover?"
        }
        ("Assets", "asset_current_amount") => {
            "Can you give me a general picture of your assets and roughly what they're worth? \
             For example: property, cash, super, shares or ETFs, vehicles, or anything else significant."
        }
        ("Loan", "liabilities") => {
            "Do you currently have any loans or debts? \
             For example: home loan, car finance, credit cards. Rough amounts and repayments are fine."
        }
        ("Insurance", "coverages") => {
            "What insurance do you currently have in place? \
             For example: life, TPD, income protection, private health, home or car, \
             and roughly how each is held (through work, super, or personally)."
        }
        _ => return None,
    };
    Some(text)
}
