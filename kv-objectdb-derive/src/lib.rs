use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type, parse_macro_input, spanned::Spanned};

#[proc_macro_derive(Entity, attributes(objectdb))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_entity(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_derive(Embedded, attributes(objectdb))]
pub fn derive_embedded(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_embedded(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct StructAttrs {
    kind: Option<LitStr>,
    id_with: Option<LitStr>,
}

#[derive(Default)]
struct FieldAttrs {
    id: bool,
    parent: bool,
    skip: bool,
    rename: Option<LitStr>,
}

struct MappedField<'a> {
    ident: &'a Ident,
    ty: &'a Type,
    attrs: FieldAttrs,
}

impl MappedField<'_> {
    fn property_name(&self) -> String {
        match &self.attrs.rename {
            Some(name) => name.value(),
            None => self.ident.to_string(),
        }
    }
}

fn parse_struct_attrs(input: &DeriveInput) -> syn::Result<StructAttrs> {
    let mut attrs = StructAttrs::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("objectdb")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                attrs.kind = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("id_with") {
                attrs.id_with = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error("unknown objectdb attribute, expected `kind` or `id_with`"));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("objectdb")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                attrs.id = true;
            } else if meta.path.is_ident("parent") {
                attrs.parent = true;
            } else if meta.path.is_ident("skip") {
                attrs.skip = true;
            } else if meta.path.is_ident("rename") {
                attrs.rename = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error(
                    "unknown objectdb attribute, expected `id`, `parent`, `skip` or `rename`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

// 只支持具名字段的非泛型结构体
fn named_fields(input: &DeriveInput) -> syn::Result<Vec<MappedField<'_>>> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "generic types cannot be mapped",
        ));
    }
    let Data::Struct(data_struct) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "only structs with named fields can be mapped",
        ));
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return Err(syn::Error::new(
            data_struct.fields.span(),
            "only structs with named fields can be mapped",
        ));
    };

    let mut mapped = Vec::new();
    for field in fields.named.iter() {
        let attrs = parse_field_attrs(field)?;
        if attrs.skip {
            continue;
        }
        if let Some(ident) = field.ident.as_ref() {
            mapped.push(MappedField {
                ident,
                ty: &field.ty,
                attrs,
            });
        }
    }
    Ok(mapped)
}

fn field_def(field: &MappedField<'_>, role: TokenStream2) -> TokenStream2 {
    let ident = field.ident;
    let ty = field.ty;
    let name = field.property_name();
    quote! {
        ::kv_objectdb::FieldDef::new(
            #name,
            ::kv_objectdb::FieldRole::#role,
            <#ty as ::kv_objectdb::FieldValue>::KIND,
            |e: &Self| ::kv_objectdb::FieldValue::to_value(&e.#ident),
            |e: &mut Self, v: ::kv_objectdb::Value| -> ::core::result::Result<(), ::kv_objectdb::DecodeError> {
                e.#ident = ::kv_objectdb::FieldValue::from_value(v)?;
                ::core::result::Result::Ok(())
            },
        )
    }
}

fn expand_entity(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let struct_attrs = parse_struct_attrs(input)?;
    let fields = named_fields(input)?;

    // 没有显式标记且没有组合标识时，名为 `id` 的字段即标识
    let implicit_id = struct_attrs.id_with.is_none() && !fields.iter().any(|f| f.attrs.id);

    let field_defs = fields.iter().map(|field| {
        let role = if field.attrs.id || (implicit_id && field.ident == "id") {
            format_ident!("Id")
        } else if field.attrs.parent {
            format_ident!("Parent")
        } else {
            format_ident!("Property")
        };
        field_def(field, quote!(#role))
    });

    let kind = match &struct_attrs.kind {
        Some(kind) => kind.value(),
        None => struct_name.to_string(),
    };
    let type_name = struct_name.to_string();

    let id_accessor = struct_attrs.id_with.as_ref().map(|method| {
        let method = format_ident!("{}", method.value(), span = method.span());
        quote! {
            fn id_accessor() -> ::core::option::Option<fn(&Self) -> ::kv_objectdb::Id> {
                let accessor: fn(&Self) -> ::kv_objectdb::Id =
                    |e: &Self| ::kv_objectdb::Id::from(e.#method());
                ::core::option::Option::Some(accessor)
            }
        }
    });

    Ok(quote! {
        impl ::kv_objectdb::Mapped for #struct_name {
            fn fields() -> ::std::vec::Vec<::kv_objectdb::FieldDef<Self>> {
                ::std::vec![#(#field_defs),*]
            }
        }

        impl ::kv_objectdb::Entity for #struct_name {
            fn kind() -> ::kv_objectdb::Kind {
                ::kv_objectdb::Kind::from_static(#kind)
            }

            #id_accessor
        }

        ::kv_objectdb::inventory::submit! {
            ::kv_objectdb::EntityMeta {
                kind: #kind,
                type_name: ::core::concat!(::core::module_path!(), "::", #type_name),
            }
        }
    })
}

fn expand_embedded(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let struct_attrs = parse_struct_attrs(input)?;
    if let Some(attr) = struct_attrs.kind.as_ref().or(struct_attrs.id_with.as_ref()) {
        return Err(syn::Error::new(
            attr.span(),
            "embedded types have no kind or identifier",
        ));
    }

    let fields = named_fields(input)?;
    if let Some(field) = fields.iter().find(|f| f.attrs.id || f.attrs.parent) {
        return Err(syn::Error::new(
            field.ident.span(),
            "embedded types are stored by value and cannot declare `id` or `parent`",
        ));
    }
    let field_defs = fields.iter().map(|field| field_def(field, quote!(Property)));

    Ok(quote! {
        impl ::kv_objectdb::Mapped for #struct_name {
            fn fields() -> ::std::vec::Vec<::kv_objectdb::FieldDef<Self>> {
                ::std::vec![#(#field_defs),*]
            }
        }

        impl ::kv_objectdb::FieldValue for #struct_name {
            const KIND: ::kv_objectdb::ValueKind = ::kv_objectdb::ValueKind::Entity;

            fn to_value(&self) -> ::kv_objectdb::Value {
                ::kv_objectdb::encode_embedded(self)
            }

            fn from_value(
                value: ::kv_objectdb::Value,
            ) -> ::core::result::Result<Self, ::kv_objectdb::DecodeError> {
                ::kv_objectdb::decode_embedded(value)
            }
        }
    })
}
