use gateflow_core::{AgentRole, GateType, ProjectKind};

/// The per-gate required-agent contract.
///
/// Every listed agent must have at least one completed spawn before the
/// gate can be presented. AI/ML projects widen G5, G6, and G8.
pub fn required_agents(gate: GateType, kind: ProjectKind) -> Vec<AgentRole> {
    let mut agents = match gate {
        GateType::G1 => Vec::new(),
        GateType::G2 => vec![AgentRole::ProductManager],
        GateType::G3 => vec![AgentRole::Architect],
        GateType::G4 => vec![AgentRole::UxDesigner],
        GateType::G5 => vec![
            AgentRole::FrontendDeveloper,
            AgentRole::BackendDeveloper,
        ],
        GateType::G6 => vec![AgentRole::QaEngineer],
        GateType::G7 => vec![AgentRole::SecurityEngineer],
        GateType::G8 => vec![AgentRole::DevOpsEngineer],
        GateType::G9 => vec![AgentRole::DevOpsEngineer],
    };
    if kind == ProjectKind::AiMl {
        match gate {
            GateType::G5 => {
                agents.push(AgentRole::MlEngineer);
                agents.push(AgentRole::PromptEngineer);
            }
            GateType::G6 => agents.push(AgentRole::ModelEvaluator),
            GateType::G8 => agents.push(AgentRole::AiOps),
            _ => {}
        }
    }
    agents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_g1_requires_no_agent() {
        assert!(required_agents(GateType::G1, ProjectKind::Standard).is_empty());
        assert!(required_agents(GateType::G1, ProjectKind::AiMl).is_empty());
    }

    #[test]
    fn test_g5_requires_both_developers() {
        let agents = required_agents(GateType::G5, ProjectKind::Standard);
        assert_eq!(
            agents,
            vec![AgentRole::FrontendDeveloper, AgentRole::BackendDeveloper]
        );
    }

    #[test]
    fn test_ai_ml_supplements() {
        let g5 = required_agents(GateType::G5, ProjectKind::AiMl);
        assert!(g5.contains(&AgentRole::MlEngineer));
        assert!(g5.contains(&AgentRole::PromptEngineer));
        assert_eq!(g5.len(), 4);

        let g6 = required_agents(GateType::G6, ProjectKind::AiMl);
        assert_eq!(g6, vec![AgentRole::QaEngineer, AgentRole::ModelEvaluator]);

        let g8 = required_agents(GateType::G8, ProjectKind::AiMl);
        assert_eq!(g8, vec![AgentRole::DevOpsEngineer, AgentRole::AiOps]);

        // G9 stays DevOps-only even for AI/ML.
        assert_eq!(
            required_agents(GateType::G9, ProjectKind::AiMl),
            vec![AgentRole::DevOpsEngineer]
        );
    }
}
