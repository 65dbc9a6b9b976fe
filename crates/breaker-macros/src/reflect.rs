// #[reflect] proc-macro implementation
//
// Generates a `breaker::Reflected` impl declaring each method of an
// inherent impl block.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::meta::ParseNestedMeta;
use syn::{
    Attribute, FnArg, GenericArgument, ImplItem, ImplItemFn, ItemImpl, LitStr, PathArguments,
    Result, ReturnType, Type, TypePath,
};

/// Scalar types declared in primitive form
const SCALARS: &[&str] = &[
    "bool", "char", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128",
    "usize", "f32", "f64",
];

/// Arguments of the impl-level attribute
#[derive(Default)]
pub struct ReflectArgs {
    extends: Option<Type>,
}

impl ReflectArgs {
    pub fn parse(&mut self, meta: ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("extends") {
            self.extends = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported reflect argument, expected `extends = Type`"))
        }
    }
}

/// Per-method `#[reflect(...)]` options
#[derive(Default)]
struct MethodOptions {
    skip: bool,
    protected: bool,
    name: Option<LitStr>,
}

enum ReturnKind {
    Void,
    Plain(Type),
    Fallible(Type),
}

/// Expands the #[reflect] attribute macro.
///
/// Example expansion:
/// ```ignore
/// // Input:
/// #[reflect]
/// impl Account {
///     fn adjust(&mut self, delta: i64) -> bool { .. }
/// }
///
/// // Output:
/// impl Account {
///     fn adjust(&mut self, delta: i64) -> bool { .. }
/// }
///
/// impl ::breaker::Reflected for Account {
///     fn declare(builder: ::breaker::TypeBuilder<Self>) -> ::breaker::TypeBuilder<Self> {
///         builder.method(
///             ::breaker::MethodDecl::new("adjust")
///                 .visibility(::breaker::Visibility::Private)
///                 .param(::breaker::TypeHandle::primitive::<i64>())
///                 .returns(::breaker::TypeHandle::of::<bool>()),
///             |this: &mut Self, args: &mut ::breaker::Arguments| -> Result<..> {
///                 let arg0 = args.take::<i64>(0usize)?;
///                 Ok(::breaker::Value::new(Self::adjust(this, arg0)))
///             },
///         )
///     }
/// }
/// ```
pub fn expand_reflect(args: ReflectArgs, mut item: ItemImpl) -> Result<TokenStream> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[reflect] only supports inherent impl blocks",
        ));
    }
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "#[reflect] does not support generic impl blocks",
        ));
    }

    let mut declarations = Vec::new();
    for impl_item in &mut item.items {
        if let ImplItem::Fn(method) = impl_item {
            let options = take_method_options(&mut method.attrs)?;
            if options.skip {
                continue;
            }
            declarations.push(declare_method(method, &options)?);
        }
    }

    let self_ty = &item.self_ty;
    let extends = args.extends.map(|ty| quote! { .extends::<#ty>() });

    Ok(quote! {
        #item

        impl ::breaker::Reflected for #self_ty {
            fn declare(builder: ::breaker::TypeBuilder<Self>) -> ::breaker::TypeBuilder<Self> {
                builder
                    #extends
                    #(#declarations)*
            }
        }
    })
}

/// Reads and strips `#[reflect(...)]` attributes from a method
fn take_method_options(attrs: &mut Vec<Attribute>) -> Result<MethodOptions> {
    let mut options = MethodOptions::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("reflect")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                options.skip = true;
                Ok(())
            } else if meta.path.is_ident("protected") {
                options.protected = true;
                Ok(())
            } else if meta.path.is_ident("name") {
                options.name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error(
                    "unsupported reflect attribute, expected `skip`, `protected` or `name = \"...\"`",
                ))
            }
        })?;
    }
    attrs.retain(|attr| !attr.path().is_ident("reflect"));
    Ok(options)
}

fn declare_method(method: &ImplItemFn, options: &MethodOptions) -> Result<TokenStream> {
    let sig = &method.sig;
    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(sig, "async methods cannot be reflected"));
    }
    if sig.unsafety.is_some() {
        return Err(syn::Error::new_spanned(sig, "unsafe methods cannot be reflected"));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "generic methods cannot be reflected",
        ));
    }
    if let Some(variadic) = &sig.variadic {
        return Err(syn::Error::new_spanned(variadic, "variadic methods cannot be reflected"));
    }

    let mut has_receiver = false;
    let mut param_types = Vec::new();
    for input in &sig.inputs {
        match input {
            FnArg::Receiver(receiver) => {
                if receiver.reference.is_none() || receiver.colon_token.is_some() {
                    return Err(syn::Error::new_spanned(
                        receiver,
                        "only `&self` and `&mut self` receivers are supported, add #[reflect(skip)]",
                    ));
                }
                has_receiver = true;
            }
            FnArg::Typed(pat_type) => match &*pat_type.ty {
                Type::Reference(_) | Type::ImplTrait(_) => {
                    return Err(syn::Error::new_spanned(
                        &pat_type.ty,
                        "only owned parameter types are supported",
                    ));
                }
                ty => param_types.push(ty),
            },
        }
    }

    let ident = &sig.ident;
    let name = options
        .name
        .as_ref()
        .map(LitStr::value)
        .unwrap_or_else(|| ident.to_string());

    let visibility = if options.protected {
        quote! { ::breaker::Visibility::Protected }
    } else {
        match &method.vis {
            syn::Visibility::Public(_) => quote! { ::breaker::Visibility::Public },
            // `pub(self)` and `pub(in self)` are private
            syn::Visibility::Restricted(restricted) if restricted.path.is_ident("self") => {
                quote! { ::breaker::Visibility::Private }
            }
            syn::Visibility::Restricted(_) => quote! { ::breaker::Visibility::Package },
            syn::Visibility::Inherited => quote! { ::breaker::Visibility::Private },
        }
    };

    let handles = param_types.iter().map(|ty| parameter_handle(ty));

    let kind = return_kind(&sig.output)?;
    let returns = match &kind {
        ReturnKind::Plain(ty) | ReturnKind::Fallible(ty) if !is_unit(ty) => {
            Some(quote! { .returns(::breaker::TypeHandle::of::<#ty>()) })
        }
        _ => None,
    };

    let args_ident = if param_types.is_empty() {
        format_ident!("_args")
    } else {
        format_ident!("args")
    };
    let arg_idents: Vec<_> = (0..param_types.len())
        .map(|i| format_ident!("arg{}", i))
        .collect();
    let extractions = arg_idents
        .iter()
        .zip(&param_types)
        .enumerate()
        .map(|(i, (arg, ty))| {
            quote! { let #arg = #args_ident.take::<#ty>(#i)?; }
        });

    let call = if has_receiver {
        quote! { Self::#ident(this, #(#arg_idents),*) }
    } else {
        quote! { Self::#ident(#(#arg_idents),*) }
    };

    let result = match kind {
        ReturnKind::Void => quote! {
            #call;
            ::core::result::Result::Ok(::breaker::Value::void())
        },
        ReturnKind::Plain(_) => quote! {
            ::core::result::Result::Ok(::breaker::Value::new(#call))
        },
        ReturnKind::Fallible(_) => quote! {
            #call
                .map(::breaker::Value::new)
                .map_err(::core::convert::Into::<::breaker::BoxError>::into)
        },
    };

    let decl = quote! {
        ::breaker::MethodDecl::new(#name)
            .visibility(#visibility)
            #(.param(#handles))*
            #returns
    };

    if has_receiver {
        Ok(quote! {
            .method(
                #decl,
                |this: &mut Self, #args_ident: &mut ::breaker::Arguments|
                    -> ::core::result::Result<::breaker::Value, ::breaker::BoxError> {
                    #(#extractions)*
                    #result
                },
            )
        })
    } else {
        Ok(quote! {
            .static_method(
                #decl,
                |#args_ident: &mut ::breaker::Arguments|
                    -> ::core::result::Result<::breaker::Value, ::breaker::BoxError> {
                    #(#extractions)*
                    #result
                },
            )
        })
    }
}

fn parameter_handle(ty: &Type) -> TokenStream {
    if is_scalar(ty) {
        quote! { ::breaker::TypeHandle::primitive::<#ty>() }
    } else {
        quote! { ::breaker::TypeHandle::of::<#ty>() }
    }
}

fn is_scalar(ty: &Type) -> bool {
    match ty {
        Type::Path(path) if path.qself.is_none() => path
            .path
            .get_ident()
            .is_some_and(|ident| SCALARS.iter().any(|scalar| ident == *scalar)),
        _ => false,
    }
}

fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(tuple) if tuple.elems.is_empty())
}

fn return_kind(output: &ReturnType) -> Result<ReturnKind> {
    let ty = match output {
        ReturnType::Default => return Ok(ReturnKind::Void),
        ReturnType::Type(_, ty) => &**ty,
    };
    match ty {
        Type::Reference(_) | Type::ImplTrait(_) => Err(syn::Error::new_spanned(
            ty,
            "only owned return types are supported",
        )),
        _ if is_unit(ty) => Ok(ReturnKind::Void),
        Type::Path(path) => match result_ok_type(path) {
            Some(ok) => Ok(ReturnKind::Fallible(ok)),
            None => Ok(ReturnKind::Plain(ty.clone())),
        },
        _ => Ok(ReturnKind::Plain(ty.clone())),
    }
}

/// `T` of a `Result<T, ..>` (or `io::Result<T>`-style alias)
fn result_ok_type(path: &TypePath) -> Option<Type> {
    let last = path.path.segments.last()?;
    if last.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty.clone()),
        _ => None,
    })
}
