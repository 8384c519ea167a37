//! Derive macro implementation for `HazelcastCompact`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, Attribute, Data, DataEnum, DeriveInput, Error, Expr, ExprCall, Fields,
    GenericArgument, Ident, LitStr, PathArguments, Type,
};

pub fn derive_compact_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = match &input.data {
        Data::Struct(_) => expand_struct(&input),
        Data::Enum(data) => expand_enum(&input, data),
        Data::Union(_) => Err(Error::new(
            input.ident.span(),
            "HazelcastCompact can only be derived for structs and fieldless enums",
        )),
    };
    TokenStream::from(expanded.unwrap_or_else(Error::into_compile_error))
}

#[derive(Default)]
struct ContainerAttrs {
    type_name: Option<String>,
    default: bool,
    constructors: Vec<LitStr>,
}

fn container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut parsed = ContainerAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("hazelcast") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type_name") {
                let lit: LitStr = meta.value()?.parse()?;
                parsed.type_name = Some(lit.value());
            } else if meta.path.is_ident("default") {
                parsed.default = true;
            } else if meta.path.is_ident("constructor") {
                parsed.constructors.push(meta.value()?.parse()?);
            } else {
                return Err(meta.error("unknown hazelcast container attribute"));
            }
            Ok(())
        })?;
    }
    Ok(parsed)
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    skip: bool,
}

fn field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("hazelcast") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                parsed.rename = Some(lit.value());
            } else if meta.path.is_ident("skip") {
                parsed.skip = true;
            } else {
                return Err(meta.error("unknown hazelcast field attribute"));
            }
            Ok(())
        })?;
    }
    Ok(parsed)
}

/// How a member wraps its element type.
#[derive(Clone, Copy)]
enum Shape {
    Plain,
    Nullable,
    Array { optional: bool },
    NullableArray { optional: bool },
}

struct Member<'a> {
    ident: &'a Ident,
    name: String,
    shape: Shape,
    elem: &'a Type,
}

impl Member<'_> {
    fn kind(&self) -> TokenStream2 {
        let elem = self.elem;
        let kind = match self.shape {
            Shape::Plain => quote!(KIND),
            Shape::Nullable => quote!(NULLABLE_KIND),
            Shape::Array { .. } => quote!(ARRAY_KIND),
            Shape::NullableArray { .. } => quote!(NULLABLE_ARRAY_KIND),
        };
        quote! { <#elem as ::hazelcast_compact::CompactField>::#kind }
    }

    fn write(&self) -> TokenStream2 {
        let (elem, ident, name) = (self.elem, self.ident, &self.name);
        let field = quote! { <#elem as ::hazelcast_compact::CompactField> };
        match self.shape {
            Shape::Plain => quote! { #field::write(writer, #name, &self.#ident)?; },
            Shape::Nullable => {
                quote! { #field::write_nullable(writer, #name, self.#ident.as_ref())?; }
            }
            Shape::Array { optional: false } => {
                quote! { #field::write_array(writer, #name, Some(self.#ident.as_slice()))?; }
            }
            Shape::Array { optional: true } => {
                quote! { #field::write_array(writer, #name, self.#ident.as_deref())?; }
            }
            Shape::NullableArray { optional: false } => quote! {
                #field::write_nullable_array(writer, #name, Some(self.#ident.as_slice()))?;
            },
            Shape::NullableArray { optional: true } => {
                quote! { #field::write_nullable_array(writer, #name, self.#ident.as_deref())?; }
            }
        }
    }

    fn read(&self) -> TokenStream2 {
        let (elem, name) = (self.elem, &self.name);
        let field = quote! { <#elem as ::hazelcast_compact::CompactField> };
        let required = quote! { ::hazelcast_compact::reflection::required };
        match self.shape {
            Shape::Plain => quote! { #field::read(reader, #name)? },
            Shape::Nullable => quote! { #field::read_nullable(reader, #name)? },
            Shape::Array { optional: false } => {
                quote! { #required(#field::read_array(reader, #name)?, #name)? }
            }
            Shape::Array { optional: true } => quote! { #field::read_array(reader, #name)? },
            Shape::NullableArray { optional: false } => {
                quote! { #required(#field::read_nullable_array(reader, #name)?, #name)? }
            }
            Shape::NullableArray { optional: true } => {
                quote! { #field::read_nullable_array(reader, #name)? }
            }
        }
    }
}

/// Returns `T` when `ty` is `wrapper<T>`.
fn wrapped<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    if path.qself.is_some() {
        return None;
    }
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}

const COLLECTIONS: &[&str] = &[
    "Vec", "Option", "HashMap", "BTreeMap", "HashSet", "BTreeSet", "VecDeque", "LinkedList",
    "BinaryHeap", "Box", "Rc", "Arc",
];

fn shape_of<'a>(ident: &Ident, ty: &'a Type) -> syn::Result<(Shape, &'a Type)> {
    let (shape, elem) = if let Some(inner) = wrapped(ty, "Option") {
        match wrapped(inner, "Vec") {
            Some(items) => match wrapped(items, "Option") {
                Some(elem) => (Shape::NullableArray { optional: true }, elem),
                None => (Shape::Array { optional: true }, items),
            },
            None => (Shape::Nullable, inner),
        }
    } else if let Some(items) = wrapped(ty, "Vec") {
        match wrapped(items, "Option") {
            Some(elem) => (Shape::NullableArray { optional: false }, elem),
            None => (Shape::Array { optional: false }, items),
        }
    } else {
        (Shape::Plain, ty)
    };

    let unsupported = |what: &str| {
        Err(Error::new(
            ty.span(),
            format!("member `{}` has an unsupported type: {}", ident, what),
        ))
    };
    match elem {
        Type::Path(path) if path.qself.is_none() => {
            let Some(last) = path.path.segments.last() else {
                return unsupported("empty path");
            };
            if COLLECTIONS.iter().any(|c| last.ident == c) {
                return unsupported("nested collections, maps and sets are not supported");
            }
            Ok((shape, elem))
        }
        Type::Reference(_) => unsupported("references are not supported"),
        Type::Tuple(_) => unsupported("tuples are not supported"),
        Type::Array(_) | Type::Slice(_) => unsupported("use Vec<T> for arrays"),
        Type::TraitObject(_) | Type::ImplTrait(_) => unsupported("trait objects are not supported"),
        _ => unsupported("only named types are supported"),
    }
}

fn expand_struct(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "HazelcastCompact cannot be derived for generic types",
        ));
    }
    let Data::Struct(data) = &input.data else {
        unreachable!("expand_struct is only called for structs");
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(Error::new(
            name.span(),
            "HazelcastCompact only supports structs with named fields",
        ));
    };

    let attrs = container_attrs(&input.attrs)?;
    let type_name = attrs.type_name.clone().unwrap_or_else(|| name.to_string());

    let mut members = Vec::new();
    let mut skipped = Vec::new();
    for field in &fields.named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_attrs = field_attrs(&field.attrs)?;
        if field_attrs.skip {
            skipped.push(ident);
            continue;
        }
        let (shape, elem) = shape_of(ident, &field.ty)?;
        members.push(Member {
            ident,
            name: field_attrs.rename.unwrap_or_else(|| ident.to_string()),
            shape,
            elem,
        });
    }

    let member_consts = members.iter().map(|m| {
        let member_name = &m.name;
        let kind = m.kind();
        quote! { ::hazelcast_compact::Member { name: #member_name, kind: #kind } }
    });
    let writes = members.iter().map(Member::write);
    let assigns = members.iter().map(|m| {
        let (ident, member_name, read) = (m.ident, &m.name, m.read());
        quote! { #member_name => self.#ident = #read, }
    });

    let mut constructors = Vec::new();
    if attrs.default {
        constructors.push(quote! {
            ::hazelcast_compact::Constructor {
                params: &[],
                construct: |_| Ok(<Self as ::core::default::Default>::default()),
            }
        });
    }
    for signature in &attrs.constructors {
        constructors.push(declared_constructor(signature, &members)?);
    }
    if attrs.constructors.is_empty() && !attrs.default {
        let params = members.iter().map(|m| &m.name);
        let inits = members.iter().map(|m| {
            let (ident, read) = (m.ident, m.read());
            quote! { #ident: #read }
        });
        constructors.push(quote! {
            ::hazelcast_compact::Constructor {
                params: &[#(#params),*],
                construct: |reader| Ok(Self {
                    #(#inits,)*
                    #(#skipped: ::core::default::Default::default(),)*
                }),
            }
        });
    }

    Ok(quote! {
        impl ::hazelcast_compact::Reflective for #name {
            const TYPE_NAME: &'static str = #type_name;

            const MEMBERS: &'static [::hazelcast_compact::Member] = &[#(#member_consts),*];

            fn write_members(
                &self,
                writer: &mut dyn ::hazelcast_compact::CompactWriter,
            ) -> ::hazelcast_compact::Result<()> {
                #(#writes)*
                Ok(())
            }

            #[allow(unused_variables)]
            fn constructors() -> ::std::vec::Vec<::hazelcast_compact::Constructor<Self>> {
                vec![#(#constructors),*]
            }

            #[allow(unreachable_code, unused_variables)]
            fn read_member(
                &mut self,
                name: &str,
                reader: &mut dyn ::hazelcast_compact::CompactReader,
            ) -> ::hazelcast_compact::Result<()> {
                match name {
                    #(#assigns)*
                    other => {
                        return Err(::hazelcast_compact::HazelcastError::Serialization(format!(
                            "{} has no member '{}'",
                            #type_name, other
                        )))
                    }
                }
                Ok(())
            }
        }

        ::hazelcast_compact::__compact_field!(struct #name);
    })
}

/// Builds a constructor from `"path(a, b)"`, where every argument names a
/// member.
fn declared_constructor(signature: &LitStr, members: &[Member<'_>]) -> syn::Result<TokenStream2> {
    let call: ExprCall = signature.parse()?;
    let Expr::Path(func) = call.func.as_ref() else {
        return Err(Error::new(signature.span(), "constructor must be a function path"));
    };
    let func = if func.path.segments.len() == 1 {
        let ident = &func.path.segments[0].ident;
        quote! { Self::#ident }
    } else {
        let path = &func.path;
        quote! { #path }
    };

    let mut params = Vec::new();
    let mut reads = Vec::new();
    for arg in &call.args {
        let Expr::Path(arg) = arg else {
            return Err(Error::new(signature.span(), "constructor arguments must be member names"));
        };
        let Some(param) = arg.path.get_ident().map(Ident::to_string) else {
            return Err(Error::new(signature.span(), "constructor arguments must be member names"));
        };
        let lowered = param.to_lowercase();
        let Some(member) = members.iter().find(|m| m.name.to_lowercase() == lowered) else {
            return Err(Error::new(
                signature.span(),
                format!("constructor parameter `{}` does not name a member", param),
            ));
        };
        reads.push(member.read());
        params.push(param);
    }
    Ok(quote! {
        ::hazelcast_compact::Constructor {
            params: &[#(#params),*],
            construct: |reader| Ok(#func(#(#reads),*)),
        }
    })
}

fn expand_enum(input: &DeriveInput, data: &DataEnum) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "HazelcastCompact cannot be derived for generic types",
        ));
    }
    if data.variants.is_empty() {
        return Err(Error::new(name.span(), "HazelcastCompact needs at least one variant"));
    }
    let mut idents = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(Error::new(
                variant.span(),
                "HazelcastCompact only supports enums without fields",
            ));
        }
        idents.push(&variant.ident);
    }
    let names: Vec<String> = idents.iter().map(|i| i.to_string()).collect();

    Ok(quote! {
        impl ::hazelcast_compact::CompactEnum for #name {
            fn variant_name(&self) -> &'static str {
                match self {
                    #(Self::#idents => #names,)*
                }
            }

            fn from_variant_name(name: &str) -> ::core::option::Option<Self> {
                match name {
                    #(#names => Some(Self::#idents),)*
                    _ => None,
                }
            }
        }

        ::hazelcast_compact::__compact_field!(enum #name);
    })
}
