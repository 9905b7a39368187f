use std::collections::BTreeSet;

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Field, Fields, LitInt, LitStr, Type, parse_macro_input};

#[derive(Default)]
struct FieldOptions {
    rename: Option<String>,
    label: Option<String>,
    kind: Option<String>,
    placeholder: Option<String>,
    input_type: Option<String>,
    pattern: Option<String>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    rows: Option<u32>,
    cols: Option<u32>,
    required: bool,
    disabled: bool,
    multiple: bool,
    skip: bool,
}

#[proc_macro_derive(SchemaModel, attributes(field))]
pub fn derive_schema_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.ident,
            "SchemaModel derive currently supports only non-generic structs",
        ));
    }

    let model_ident = input.ident;
    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return Err(syn::Error::new(
                    Span::call_site(),
                    "SchemaModel derive requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                Span::call_site(),
                "SchemaModel derive is only supported on structs",
            ));
        }
    };

    let calmform = calmform_path();
    let mut seen = BTreeSet::new();
    let mut schema_fields = Vec::new();
    let mut value_inserts = Vec::new();

    for field in named_fields {
        let options = parse_field_options(&field)?;
        if options.skip {
            continue;
        }
        let Some(field_ident) = field.ident.clone() else {
            continue;
        };
        let name = options
            .rename
            .clone()
            .unwrap_or_else(|| field_ident.to_string());
        if name.is_empty() {
            return Err(syn::Error::new_spanned(&field_ident, "field name must not be empty"));
        }
        if !seen.insert(name.clone()) {
            return Err(syn::Error::new_spanned(
                &field_ident,
                format!("duplicate form field name `{name}`"),
            ));
        }

        schema_fields.push(field_schema_tokens(&calmform, &field, &name, &options)?);
        value_inserts.push(quote! {
            values.insert(
                ::std::string::String::from(#name),
                #calmform::form::FieldValue::from(::std::clone::Clone::clone(&self.#field_ident)),
            );
        });
    }

    Ok(quote! {
        impl #calmform::form::SchemaModel for #model_ident {
            fn schema() -> #calmform::form::FormSchema {
                match #calmform::form::FormSchema::new(::std::vec![#(#schema_fields),*]) {
                    ::std::result::Result::Ok(schema) => schema,
                    ::std::result::Result::Err(error) => {
                        ::std::unreachable!("derived field names are checked at compile time: {error}")
                    }
                }
            }

            fn to_values(&self) -> #calmform::form::ValueMap {
                let mut values = #calmform::form::ValueMap::new();
                #(#value_inserts)*
                values
            }
        }
    })
}

fn parse_field_options(field: &Field) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("field")) {
        attr.parse_nested_meta(|meta| {
            let key = meta
                .path
                .get_ident()
                .map(Ident::to_string)
                .unwrap_or_default();
            match key.as_str() {
                "required" => options.required = true,
                "disabled" => options.disabled = true,
                "multiple" => options.multiple = true,
                "skip" => options.skip = true,
                "rename" => options.rename = Some(meta.value()?.parse::<LitStr>()?.value()),
                "label" => options.label = Some(meta.value()?.parse::<LitStr>()?.value()),
                "placeholder" => {
                    options.placeholder = Some(meta.value()?.parse::<LitStr>()?.value());
                }
                "pattern" => options.pattern = Some(meta.value()?.parse::<LitStr>()?.value()),
                "kind" => {
                    let lit = meta.value()?.parse::<LitStr>()?;
                    let kind = lit.value();
                    if !matches!(kind.as_str(), "input" | "select" | "checkbox" | "textarea") {
                        return Err(syn::Error::new_spanned(
                            lit,
                            "kind must be one of input, select, checkbox, textarea",
                        ));
                    }
                    options.kind = Some(kind);
                }
                "input_type" => {
                    let lit = meta.value()?.parse::<LitStr>()?;
                    let value = lit.value();
                    if input_type_variant(&value).is_none() {
                        return Err(syn::Error::new_spanned(
                            lit,
                            "input_type must be one of text, email, password, number, tel, url",
                        ));
                    }
                    options.input_type = Some(value);
                }
                "min_length" => {
                    options.min_length = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?);
                }
                "max_length" => {
                    options.max_length = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?);
                }
                "rows" => options.rows = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?),
                "cols" => options.cols = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?),
                _ => return Err(meta.error("unsupported `field` attribute")),
            }
            Ok(())
        })?;
    }
    Ok(options)
}

fn field_schema_tokens(
    calmform: &TokenStream2,
    field: &Field,
    name: &str,
    options: &FieldOptions,
) -> syn::Result<TokenStream2> {
    let label = options.label.clone().unwrap_or_else(|| name.to_string());
    let kind = options
        .kind
        .clone()
        .unwrap_or_else(|| inferred_kind(&field.ty).to_string());
    let constructor = format_ident!("{kind}");
    let mut tokens = quote! { #calmform::form::FieldSchema::#constructor(#name, #label) };

    if options.required {
        tokens.extend(quote! { .required(true) });
    }
    if options.disabled {
        tokens.extend(quote! { .disabled(true) });
    }
    if let Some(placeholder) = &options.placeholder {
        tokens.extend(quote! { .placeholder(#placeholder) });
    }
    if let Some(input_type) = options.input_type.as_deref().and_then(input_type_variant) {
        let variant = format_ident!("{input_type}");
        tokens.extend(quote! { .input_type(#calmform::form::InputType::#variant) });
    }
    if let Some(pattern) = &options.pattern {
        tokens.extend(quote! { .pattern(#pattern) });
    }
    if let Some(min_length) = options.min_length {
        tokens.extend(quote! { .min_length(#min_length) });
    }
    if let Some(max_length) = options.max_length {
        tokens.extend(quote! { .max_length(#max_length) });
    }
    if let Some(rows) = options.rows {
        tokens.extend(quote! { .rows(#rows) });
    }
    if let Some(cols) = options.cols {
        tokens.extend(quote! { .cols(#cols) });
    }
    if options.multiple || (kind == "select" && is_vec(&field.ty)) {
        tokens.extend(quote! { .multiple(true) });
    }
    Ok(tokens)
}

fn inferred_kind(ty: &Type) -> &'static str {
    match last_segment(ty).as_deref() {
        Some("bool") => "checkbox",
        Some("Vec") => "select",
        _ => "input",
    }
}

fn is_vec(ty: &Type) -> bool {
    last_segment(ty).as_deref() == Some("Vec")
}

fn last_segment(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    }
}

fn input_type_variant(value: &str) -> Option<&'static str> {
    match value {
        "text" => Some("Text"),
        "email" => Some("Email"),
        "password" => Some("Password"),
        "number" => Some("Number"),
        "tel" => Some("Tel"),
        "url" => Some("Url"),
        _ => None,
    }
}

fn calmform_path() -> TokenStream2 {
    match crate_name("calmform") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::calmform),
    }
}
