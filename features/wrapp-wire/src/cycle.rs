use std::collections::{BTreeMap, HashMap};

use crate::{
    dependency_graph::ProvidedType,
    errors::{CycleLink, Diagnostic, ErrorCollector, ErrorKind, Errors},
    types::Type,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Checks that no type transitively needs itself
///
/// Returns one error per back edge found.
pub(crate) fn verify_acyclic(providers: &BTreeMap<Type, ProvidedType>) -> Result<(), Errors> {
    let mut errors = ErrorCollector::new();
    let mut marks = HashMap::new();

    for ty in providers.keys() {
        let mut dependency_chain = Vec::new();
        check_recurse(providers, &mut marks, &mut errors, &mut dependency_chain, ty);
    }

    return errors.finish(());

    fn check_recurse<'a>(
        providers: &'a BTreeMap<Type, ProvidedType>,
        marks: &mut HashMap<&'a Type, Mark>,
        errors: &mut ErrorCollector,
        dependency_chain: &mut Vec<&'a Type>,
        ty: &'a Type,
    ) {
        match marks.get(ty) {
            Some(Mark::Done) => return,
            Some(Mark::InProgress) => {
                errors.add(cycle_error(providers, dependency_chain, ty));
                return;
            }
            None => {}
        }

        // Missing inputs are reported by the solver
        let Some(provided) = providers.get(ty) else {
            return;
        };

        marks.insert(ty, Mark::InProgress);
        dependency_chain.push(ty);

        for input in provided.origin.inputs() {
            check_recurse(providers, marks, errors, dependency_chain, input);
        }

        dependency_chain.pop();
        marks.insert(ty, Mark::Done);
    }
}

fn cycle_error(
    providers: &BTreeMap<Type, ProvidedType>,
    dependency_chain: &[&Type],
    ty: &Type,
) -> Diagnostic {
    let start = dependency_chain
        .iter()
        .position(|link| *link == ty)
        .unwrap_or(0);

    let chain: Vec<CycleLink> = dependency_chain[start..]
        .iter()
        .filter_map(|link| {
            let provided = providers.get(*link)?;
            Some(CycleLink {
                ty: (*link).clone(),
                provider: provided.origin.name(),
                position: provided.origin.position().clone(),
            })
        })
        .collect();

    let kind = ErrorKind::Cycle {
        ty: ty.clone(),
        chain,
    };
    match providers.get(ty) {
        Some(provided) => Diagnostic::at(provided.origin.position().clone(), kind),
        None => Diagnostic::new(kind),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dependency_graph::Origin,
        position::Position,
        provider::Provider,
        types::Signature,
    };

    fn provide(
        providers: &mut BTreeMap<Type, ProvidedType>,
        name: &str,
        line: u32,
        inputs: Vec<Type>,
        out: Type,
    ) {
        let position = Position::new("app/wire.go", line, 1);
        let sig = Signature::new(inputs, [out.clone()]);
        let provider = Provider::from_function("app", name, position, &sig).unwrap();
        providers.insert(
            out.clone(),
            ProvidedType {
                ty: out,
                origin: Origin::Provider(Arc::new(provider)),
            },
        );
    }

    fn ty(name: &str) -> Type {
        Type::named("app", name)
    }

    #[test]
    fn acyclic_graph_passes() {
        let mut providers = BTreeMap::new();
        provide(&mut providers, "NewA", 1, vec![ty("B"), ty("C")], ty("A"));
        provide(&mut providers, "NewB", 2, vec![ty("C")], ty("B"));
        provide(&mut providers, "NewC", 3, vec![ty("Missing")], ty("C"));

        assert!(verify_acyclic(&providers).is_ok());
    }

    #[test]
    fn two_node_cycle_names_both_types() {
        let mut providers = BTreeMap::new();
        provide(&mut providers, "NewA", 1, vec![ty("B")], ty("A"));
        provide(&mut providers, "NewB", 2, vec![ty("A")], ty("B"));

        let errors = verify_acyclic(&providers).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.errors[0].to_string(),
            "app/wire.go:1:1: cycle for app.A:\napp.A (app.NewA at app/wire.go:1:1) ->\napp.B (app.NewB at app/wire.go:2:1) ->\napp.A"
        );
    }

    #[test]
    fn every_cycle_is_reported() {
        let mut providers = BTreeMap::new();
        provide(&mut providers, "NewA", 1, vec![ty("A")], ty("A"));
        provide(&mut providers, "NewB", 2, vec![ty("C")], ty("B"));
        provide(&mut providers, "NewC", 3, vec![ty("B")], ty("C"));

        let errors = verify_acyclic(&providers).unwrap_err();
        assert_eq!(errors.len(), 2);
        match &errors.errors[0].kind {
            ErrorKind::Cycle { ty: start, chain } => {
                assert_eq!(*start, ty("A"));
                assert_eq!(chain.len(), 1);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
