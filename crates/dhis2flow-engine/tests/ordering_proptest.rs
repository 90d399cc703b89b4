//! Property tests for execution ordering

use dhis2flow_engine::pipeline::{PipelineConfig, StepConfig};
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashMap;

/// Random DAG over `s0..sN`, declared in shuffled order.
///
/// Step `i` only depends on steps with a lower index, so the graph is acyclic.
fn shuffled_dag() -> impl Strategy<Value = Vec<StepConfig>> {
    (1usize..14)
        .prop_flat_map(|n| {
            let parents = prop::collection::vec(prop::collection::vec(any::<Index>(), 0..3), n);
            let order = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
            (parents, order)
        })
        .prop_map(|(parents, order)| {
            let steps: Vec<StepConfig> = parents
                .iter()
                .enumerate()
                .map(|(i, picks)| {
                    let mut deps: Vec<String> = if i == 0 {
                        Vec::new()
                    } else {
                        picks.iter().map(|p| format!("s{}", p.index(i))).collect()
                    };
                    deps.sort();
                    deps.dedup();
                    StepConfig::new("transform", format!("s{i}")).depends_on(deps)
                })
                .collect();
            order.into_iter().map(|i| steps[i].clone()).collect()
        })
}

proptest! {
    #[test]
    fn prop_order_respects_every_edge(steps in shuffled_dag()) {
        let config = PipelineConfig::new("prop", steps);
        let order = config.get_execution_order().unwrap();

        prop_assert_eq!(order.len(), config.steps.len());
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        prop_assert_eq!(position.len(), order.len());

        for step in &config.steps {
            for dep in &step.depends_on {
                prop_assert!(position[dep.as_str()] < position[step.name.as_str()]);
            }
        }
    }

    #[test]
    fn prop_roots_keep_declaration_order(steps in shuffled_dag()) {
        let config = PipelineConfig::new("prop", steps);
        let order = config.get_execution_order().unwrap();

        let roots: Vec<&str> = config
            .steps
            .iter()
            .filter(|s| s.depends_on.is_empty())
            .map(|s| s.name.as_str())
            .collect();
        let leading: Vec<&str> = order.iter().take(roots.len()).map(String::as_str).collect();
        prop_assert_eq!(leading, roots);
    }

    #[test]
    fn prop_dangling_dependency_is_reported(steps in shuffled_dag(), pick in any::<Index>()) {
        let mut steps = steps;
        let victim = pick.index(steps.len());
        steps[victim].depends_on.push("missing".to_string());
        let config = PipelineConfig::new("prop", steps);

        prop_assert_eq!(config.validate_dependencies().len(), 1);
        prop_assert!(config.get_execution_order().is_err());
    }

    #[test]
    fn prop_back_edge_creates_cycle(n in 2usize..10) {
        // Chain s0 <- s1 <- ... <- s(n-1), then s0 depends on the tail
        let mut steps: Vec<StepConfig> = (0..n)
            .map(|i| {
                let step = StepConfig::new("transform", format!("s{i}"));
                if i == 0 { step } else { step.depends_on([format!("s{}", i - 1)]) }
            })
            .collect();
        steps[0].depends_on.push(format!("s{}", n - 1));
        let config = PipelineConfig::new("prop", steps);

        prop_assert!(config.validate_dependencies().is_empty());
        prop_assert!(config.get_execution_order().is_err());
    }
}
