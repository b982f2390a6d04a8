//! Match exhaustiveness checking for closed enum types.
//!
//! A match over an enum must either cover every declared variant or
//! include a catch-all arm (wildcard or binding). A variant counts as
//! covered only when an arm matches it unconditionally, i.e. the variant
//! pattern's payload sub-patterns are all irrefutable.

use al_common::span::Span;
use rustc_hash::FxHashSet;

use crate::error::TypeError;
use crate::registry::EnumDef;
use crate::typed::{TMatchArm, TPattern};

/// Check arm coverage against an enum definition. Returns an error when
/// variants are unreached and no catch-all is present.
pub fn check_enum_match(
    def: &EnumDef,
    arms: &[TMatchArm],
    match_span: Span,
) -> Option<TypeError> {
    let mut covered: FxHashSet<&str> = FxHashSet::default();
    for arm in arms {
        if pattern_is_catch_all(&arm.pattern) {
            return None;
        }
        collect_covered(&arm.pattern, &mut covered);
    }

    let missing: Vec<String> = def
        .variants
        .iter()
        .map(|(name, _)| name.clone())
        .filter(|name| !covered.contains(name.as_str()))
        .collect();

    if missing.is_empty() {
        None
    } else {
        Some(TypeError::NonExhaustiveMatch {
            enum_name: def.name.clone(),
            missing,
            span: match_span,
        })
    }
}

fn pattern_is_catch_all(pattern: &TPattern) -> bool {
    match pattern {
        TPattern::Wildcard { .. } | TPattern::Name { .. } => true,
        TPattern::Or { alts, .. } => alts.iter().any(pattern_is_catch_all),
        _ => false,
    }
}

fn collect_covered<'p>(pattern: &'p TPattern, covered: &mut FxHashSet<&'p str>) {
    match pattern {
        TPattern::Variant {
            variant, payload, ..
        } => {
            let unconditional = match payload {
                None => true,
                Some(subs) => subs.iter().all(|p| p.is_irrefutable()),
            };
            if unconditional {
                covered.insert(variant.as_str());
            }
        }
        TPattern::Or { alts, .. } => {
            for alt in alts {
                collect_covered(alt, covered);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EnumDef;
    use crate::ty::{Ty, TypeId};

    fn shape_def() -> EnumDef {
        EnumDef {
            id: TypeId(0),
            name: "Shape".into(),
            type_params: vec![],
            param_vars: vec![],
            variants: vec![
                ("Circle".into(), vec![Ty::float()]),
                ("Point".into(), vec![]),
            ],
        }
    }

    fn span() -> Span {
        Span::point(1, 1)
    }

    fn variant_arm(variant: &str, payload: Option<Vec<TPattern>>) -> TMatchArm {
        TMatchArm {
            pattern: TPattern::Variant {
                enum_id: TypeId(0),
                enum_name: "Shape".into(),
                variant: variant.into(),
                payload,
                span: span(),
            },
            body: crate::typed::TExpr::None { span: span() },
            span: span(),
        }
    }

    #[test]
    fn all_variants_covered() {
        let def = shape_def();
        let arms = vec![
            variant_arm(
                "Circle",
                Some(vec![TPattern::Name {
                    name: "r".into(),
                    ty: Ty::float(),
                    span: span(),
                }]),
            ),
            variant_arm("Point", None),
        ];
        assert!(check_enum_match(&def, &arms, span()).is_none());
    }

    #[test]
    fn missing_variant_reported() {
        let def = shape_def();
        let arms = vec![variant_arm("Point", None)];
        let err = check_enum_match(&def, &arms, span()).unwrap();
        match err {
            TypeError::NonExhaustiveMatch { missing, .. } => {
                assert_eq!(missing, vec!["Circle".to_string()]);
            }
            other => panic!("expected NonExhaustiveMatch, got {:?}", other),
        }
    }

    #[test]
    fn wildcard_covers_everything() {
        let def = shape_def();
        let arms = vec![TMatchArm {
            pattern: TPattern::Wildcard { span: span() },
            body: crate::typed::TExpr::None { span: span() },
            span: span(),
        }];
        assert!(check_enum_match(&def, &arms, span()).is_none());
    }

    #[test]
    fn literal_payload_does_not_cover_variant() {
        let def = shape_def();
        // `Circle(1.0)` matches only one circle, so Circle is not covered.
        let arms = vec![
            variant_arm(
                "Circle",
                Some(vec![TPattern::Float {
                    value: 1.0,
                    span: span(),
                }]),
            ),
            variant_arm("Point", None),
        ];
        let err = check_enum_match(&def, &arms, span()).unwrap();
        assert!(matches!(err, TypeError::NonExhaustiveMatch { .. }));
    }

    #[test]
    fn or_pattern_covers_both_variants() {
        let def = shape_def();
        let arms = vec![TMatchArm {
            pattern: TPattern::Or {
                alts: vec![
                    TPattern::Variant {
                        enum_id: TypeId(0),
                        enum_name: "Shape".into(),
                        variant: "Circle".into(),
                        payload: None,
                        span: span(),
                    },
                    TPattern::Variant {
                        enum_id: TypeId(0),
                        enum_name: "Shape".into(),
                        variant: "Point".into(),
                        payload: None,
                        span: span(),
                    },
                ],
                span: span(),
            },
            body: crate::typed::TExpr::None { span: span() },
            span: span(),
        }];
        assert!(check_enum_match(&def, &arms, span()).is_none());
    }
}
