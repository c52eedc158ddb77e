//! Derive macros for wireplan
//!
//! This crate provides `#[derive(Activatable)]`, which turns a struct with
//! `#[dep]`-annotated fields into a container-constructible service: the
//! macro emits the `blueprint()` descriptor and the matching `assemble()`
//! body.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wireplan::{Activatable, Registry};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! trait Metrics: Send + Sync {
//!     fn count(&self, name: &str);
//! }
//!
//! #[derive(Activatable)]
//! struct UserService {
//!     #[dep]
//!     db: Arc<Database>,
//!     #[dep(optional)]
//!     metrics: Option<Arc<dyn Metrics>>,
//!     // Fields without #[dep] use Default
//!     request_count: u64,
//! }
//! ```
//!
//! # Field attributes
//!
//! - `#[dep]` - required dependency; the field must be `Arc<T>`
//! - `#[dep(optional)]` - optional dependency; the field must be
//!   `Option<Arc<T>>`
//! - `#[dep(attr)]` - attribute site, materialized after all parameters
//! - `#[dep(by_name)]` - no type declaration; the alias table is consulted
//!   with the field name
//! - `#[dep(defer = "Name")]` - deferred string reference, resolved at
//!   planning time
//!
//! `attr` combines with `optional`, `by_name`, and `defer`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr, Meta, Type};

/// How a `#[dep]` field names its target.
enum DepTarget {
    /// Use the field's declared type.
    Declared,
    /// Consult the alias table with the field name.
    ByName,
    /// Deferred string reference.
    Defer(LitStr),
}

/// Parsed `#[dep(...)]` options for one field.
struct DepSpec {
    optional: bool,
    attr_site: bool,
    target: DepTarget,
}

impl Default for DepSpec {
    fn default() -> Self {
        Self {
            optional: false,
            attr_site: false,
            target: DepTarget::Declared,
        }
    }
}

/// Find and parse the `#[dep]` attribute on a field.
fn find_dep_attr(attrs: &[Attribute]) -> syn::Result<Option<DepSpec>> {
    for attr in attrs {
        if !attr.path().is_ident("dep") {
            continue;
        }

        let mut spec = DepSpec::default();
        if matches!(attr.meta, Meta::Path(_)) {
            return Ok(Some(spec));
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("optional") {
                spec.optional = true;
                Ok(())
            } else if meta.path.is_ident("attr") {
                spec.attr_site = true;
                Ok(())
            } else if meta.path.is_ident("by_name") {
                spec.target = DepTarget::ByName;
                Ok(())
            } else if meta.path.is_ident("defer") {
                let value = meta.value()?;
                spec.target = DepTarget::Defer(value.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported dep option"))
            }
        })?;

        if spec.optional && !matches!(spec.target, DepTarget::Declared) {
            return Err(syn::Error::new_spanned(
                attr,
                "optional cannot be combined with by_name or defer",
            ));
        }

        return Ok(Some(spec));
    }
    Ok(None)
}

/// Peel one generic layer: `unwrap_generic(ty, "Arc")` yields the `T` of
/// `Arc<T>`. Only single-argument angle-bracketed paths qualify.
fn unwrap_generic<'t>(ty: &'t Type, wrapper: &str) -> Option<&'t Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(syn::GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}

/// The dependency type behind a field: `T` out of `Arc<T>`, or out of
/// `Option<Arc<T>>` for optional sites.
fn dependency_target(ty: &Type, optional: bool) -> Option<&Type> {
    let handle = if optional {
        unwrap_generic(ty, "Option")?
    } else {
        ty
    };
    unwrap_generic(handle, "Arc")
}

/// Whether the dependency target is a trait object (`Arc<dyn Trait>`).
fn is_trait_object(ty: &Type) -> bool {
    matches!(ty, Type::TraitObject(_))
}

/// Derive macro for the `Activatable` trait.
///
/// Generates the `blueprint()` descriptor and the `assemble()` body from
/// `#[dep]`-annotated fields. Fields without `#[dep]` are initialized with
/// `Default::default()`.
#[proc_macro_derive(Activatable, attributes(dep))]
pub fn derive_activatable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    // Only structs with named fields can be assembled.
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    &input,
                    "Activatable can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Activatable can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    // Parameter sites, attribute sites, and plain fields, each in field
    // declaration order. The bag hands values out parameters-first, so the
    // assemble bindings follow that order.
    let mut blueprint_calls = Vec::new();
    let mut attr_blueprint_calls = Vec::new();
    let mut param_bindings = Vec::new();
    let mut attr_bindings = Vec::new();
    let mut field_values = Vec::new();

    for field in fields.iter() {
        let field_name = field.ident.as_ref().unwrap();
        let field_type = &field.ty;
        let site = field_name.to_string();

        let spec = match find_dep_attr(&field.attrs) {
            Ok(Some(spec)) => spec,
            Ok(None) => {
                field_values.push(quote! {
                    #field_name: ::std::default::Default::default()
                });
                continue;
            }
            Err(err) => return err.to_compile_error().into(),
        };

        // Dissect the field type into the dependency target type.
        let inner = match dependency_target(field_type, spec.optional) {
            Some(inner) => inner,
            None => {
                let expected = if spec.optional {
                    "Option<Arc<T>>"
                } else {
                    "Arc<T>"
                };
                return syn::Error::new_spanned(
                    field_type,
                    format!("dependency fields of this kind must have type {expected}"),
                )
                .to_compile_error()
                .into();
            }
        };

        let blueprint_call = match (&spec.target, spec.attr_site, spec.optional) {
            (DepTarget::Declared, false, false) => quote! { .param::<#inner>(#site) },
            (DepTarget::Declared, false, true) => quote! { .optional_param::<#inner>(#site) },
            (DepTarget::Declared, true, false) => quote! { .attr::<#inner>(#site) },
            (DepTarget::Declared, true, true) => quote! { .optional_attr::<#inner>(#site) },
            (DepTarget::ByName, false, _) => quote! { .param_by_name(#site) },
            (DepTarget::ByName, true, _) => quote! { .attr_by_name(#site) },
            (DepTarget::Defer(reference), false, _) => {
                quote! { .param_deferred(#site, #reference) }
            }
            (DepTarget::Defer(reference), true, _) => {
                quote! { .attr_deferred(#site, #reference) }
            }
        };

        let accessor = match (spec.optional, is_trait_object(inner)) {
            (false, false) => quote! { bag.required::<#inner>(#site)? },
            (false, true) => quote! { bag.required_trait::<#inner>(#site)? },
            (true, false) => quote! { bag.optional::<#inner>(#site)? },
            (true, true) => quote! { bag.optional_trait::<#inner>(#site)? },
        };
        let binding = quote! { let #field_name = #accessor; };

        if spec.attr_site {
            attr_blueprint_calls.push(blueprint_call);
            attr_bindings.push(binding);
        } else {
            blueprint_calls.push(blueprint_call);
            param_bindings.push(binding);
        }
        field_values.push(quote! { #field_name });
    }

    let expanded = quote! {
        impl #impl_generics ::wireplan::Activatable for #name #ty_generics #where_clause {
            fn blueprint() -> ::wireplan::ClassSpec {
                ::wireplan::ClassSpec::new(::std::any::type_name::<Self>())
                    #(#blueprint_calls)*
                    #(#attr_blueprint_calls)*
            }

            fn assemble(bag: &mut ::wireplan::ArgBag) -> ::wireplan::Result<Self> {
                #(#param_bindings)*
                #(#attr_bindings)*
                Ok(Self {
                    #(#field_values),*
                })
            }
        }
    };

    TokenStream::from(expanded)
}
