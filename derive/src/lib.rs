use proc_macro::TokenStream;
use quote::quote;
use syn::{parse::Parser, parse_macro_input, Data, DataStruct, DeriveInput, Fields, Meta};

/// Implements `Entry` and `EntryFields` for a struct with named fields.
///
/// The table name defaults to the snake_cased struct name and the
/// identifier column to `id`; both can be overridden through the struct
/// attribute. Fields marked `#[entry(skip)]` are invisible to the builders.
///
/// ```ignore
/// #[derive(Entry, sqlx::FromRow)]
/// #[entry(table = "users")]
/// struct User {
///     id: Option<i64>,
///     name: String,
///     age: Option<i32>,
/// }
/// ```
///
/// The `Id` associated type is the identifier field's type with one
/// `Option` level stripped, so `id: Option<i64>` gives `Id = i64`.
#[proc_macro_derive(Entry, attributes(entry))]
pub fn derive_entry(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    // parse #[entry(table = "...", id = "...")] on the struct
    let mut table_name = None;
    let mut id_column = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("entry") {
            continue;
        }
        if let Meta::List(list) = &attr.meta {
            let parser = syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated;
            if let Ok(metas) = parser.parse2(list.tokens.clone()) {
                for meta in metas {
                    if let Meta::NameValue(nv) = meta {
                        if nv.path.is_ident("table") {
                            if let syn::Expr::Lit(syn::ExprLit {
                                lit: syn::Lit::Str(s),
                                ..
                            }) = nv.value
                            {
                                table_name = Some(s.value());
                            }
                        } else if nv.path.is_ident("id") {
                            if let syn::Expr::Lit(syn::ExprLit {
                                lit: syn::Lit::Str(s),
                                ..
                            }) = nv.value
                            {
                                id_column = Some(s.value());
                            }
                        }
                    }
                }
            }
        }
    }

    let table = table_name.unwrap_or_else(|| pascal_to_snake(&name.to_string()));
    let id_column = id_column.unwrap_or_else(|| "id".to_string());

    let fields = match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return syn::Error::new_spanned(
                name,
                "Entry derive only supports structs with named fields",
            )
            .to_compile_error()
            .into();
        }
    };

    let mut column_lits: Vec<syn::LitStr> = Vec::new();
    let mut id_type: Option<syn::Type> = None;

    // field_value arms, split by Option-ness; field types without a
    // BindValue counterpart stay out and fall through to None
    let mut plain_idents: Vec<&syn::Ident> = Vec::new();
    let mut plain_columns: Vec<syn::LitStr> = Vec::new();
    let mut option_idents: Vec<&syn::Ident> = Vec::new();
    let mut option_columns: Vec<syn::LitStr> = Vec::new();

    for field in fields {
        let ident = field.ident.as_ref().unwrap();
        let column = ident.to_string();

        // parse #[entry(skip)] on the field
        let mut skip = false;
        for attr in &field.attrs {
            if !attr.path().is_ident("entry") {
                continue;
            }
            if let Meta::List(list) = &attr.meta {
                let parser =
                    syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated;
                if let Ok(metas) = parser.parse2(list.tokens.clone()) {
                    for meta in metas {
                        if let Meta::Path(path) = meta {
                            if path.is_ident("skip") {
                                skip = true;
                            }
                        }
                    }
                }
            }
        }
        if skip {
            continue;
        }

        let lit = syn::LitStr::new(&column, proc_macro2::Span::call_site());
        column_lits.push(lit.clone());

        let is_opt = is_option_type(&field.ty);
        if column == id_column {
            id_type = if is_opt {
                option_inner_type(&field.ty).cloned()
            } else {
                Some(field.ty.clone())
            };
        }

        let supported = if is_opt {
            option_inner_type(&field.ty)
                .map(is_supported_bind_type)
                .unwrap_or(false)
        } else {
            is_supported_bind_type(&field.ty)
        };
        if supported {
            if is_opt {
                option_idents.push(ident);
                option_columns.push(lit);
            } else {
                plain_idents.push(ident);
                plain_columns.push(lit);
            }
        }
    }

    let id_type = match id_type {
        Some(ty) => ty,
        None => {
            return syn::Error::new_spanned(
                name,
                format!("identifier column '{}' has no matching field", id_column),
            )
            .to_compile_error()
            .into();
        }
    };

    let id_lit = syn::LitStr::new(&id_column, proc_macro2::Span::call_site());

    let expanded = quote! {
        impl sqlxentry::Entry for #name {
            type Id = #id_type;

            fn table_name() -> &'static str {
                #table
            }

            fn columns() -> &'static [&'static str] {
                &[#(#column_lits),*]
            }

            fn id_column() -> &'static str {
                #id_lit
            }
        }

        impl sqlxentry::EntryFields for #name {
            fn field_value(&self, column: &str) -> Option<sqlxentry::BindValue> {
                match column {
                    #(
                        #plain_columns => Some(sqlxentry::BindValue::from(
                            self.#plain_idents.clone(),
                        )),
                    )*
                    #(
                        #option_columns => self
                            .#option_idents
                            .as_ref()
                            .map(|v| sqlxentry::BindValue::from(v.clone())),
                    )*
                    _ => None,
                }
            }
        }
    };

    TokenStream::from(expanded)
}

/// PascalCase to snake_case for the default table name.
fn pascal_to_snake(s: &str) -> String {
    let mut out = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

fn is_option_type(ty: &syn::Type) -> bool {
    if let syn::Type::Path(type_path) = ty {
        if let Some(seg) = type_path.path.segments.last() {
            if seg.ident == "Option" {
                if let syn::PathArguments::AngleBracketed(args) = &seg.arguments {
                    return args.args.len() == 1;
                }
            }
        }
    }
    false
}

fn option_inner_type(ty: &syn::Type) -> Option<&syn::Type> {
    if let syn::Type::Path(type_path) = ty {
        if let Some(seg) = type_path.path.segments.last() {
            if seg.ident == "Option" {
                if let syn::PathArguments::AngleBracketed(args) = &seg.arguments {
                    if let Some(syn::GenericArgument::Type(inner_ty)) = args.args.first() {
                        return Some(inner_ty);
                    }
                }
            }
        }
    }
    None
}

/// Types with a matching `BindValue` variant. Other field types still count
/// as columns, they just report no value, so the builders leave them out of
/// INSERT and UPDATE statements.
fn is_supported_bind_type(ty: &syn::Type) -> bool {
    if let syn::Type::Path(type_path) = ty {
        if let Some(seg) = type_path.path.segments.last() {
            return match seg.ident.to_string().as_str() {
                "String" | "i64" | "i32" | "i16" | "f64" | "f32" | "bool" | "DateTime" => true,
                "Vec" => {
                    if let syn::PathArguments::AngleBracketed(args) = &seg.arguments {
                        if let Some(syn::GenericArgument::Type(inner_ty)) = args.args.first() {
                            if let syn::Type::Path(inner_path) = inner_ty {
                                if let Some(inner_seg) = inner_path.path.segments.last() {
                                    return inner_seg.ident == "u8";
                                }
                            }
                        }
                    }
                    false
                }
                _ => false,
            };
        }
    }
    false
}
