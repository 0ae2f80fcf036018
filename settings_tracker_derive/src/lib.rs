use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{
    Attribute, Data, DeriveInput, Fields, Ident, LitBool, LitStr, Token, parse_macro_input,
    spanned::Spanned,
};

#[proc_macro_derive(
    Trackable,
    attributes(trackable, tracking_key, persist_request, event_source)
)]
pub fn derive_trackable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_trackable(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// One argument inside `#[trackable(...)]`.
enum TrackableArg {
    Flag(bool),
    Context(String),
    Name(String),
    Aware,
    Skip,
}

impl Parse for TrackableArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(LitBool) {
            let lit: LitBool = input.parse()?;
            return Ok(TrackableArg::Flag(lit.value));
        }

        let ident = input.call(Ident::parse_any)?;
        match ident.to_string().as_str() {
            "context" => {
                input.parse::<Token![=]>()?;
                let lit: LitStr = input.parse()?;
                Ok(TrackableArg::Context(lit.value()))
            }
            "name" => {
                input.parse::<Token![=]>()?;
                let lit: LitStr = input.parse()?;
                Ok(TrackableArg::Name(lit.value()))
            }
            "aware" => Ok(TrackableArg::Aware),
            "skip" => Ok(TrackableArg::Skip),
            _ => Err(syn::Error::new(
                ident.span(),
                "Unsupported #[trackable(...)] option. Supported: true, false, context = \"...\", name = \"...\", aware, skip",
            )),
        }
    }
}

/// A trackable marker, optionally scoped to a tracker context.
struct Marker {
    context: Option<String>,
    trackable: bool,
}

#[derive(Default)]
struct TrackableOptions {
    markers: Vec<Marker>,
    name: Option<String>,
    aware: bool,
    skip: bool,
}

fn parse_trackable_options(attrs: &[Attribute]) -> syn::Result<TrackableOptions> {
    let mut options = TrackableOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("trackable") {
            continue;
        }

        let args = match &attr.meta {
            syn::Meta::Path(_) => Punctuated::new(),
            syn::Meta::List(_) => {
                attr.parse_args_with(Punctuated::<TrackableArg, Token![,]>::parse_terminated)?
            }
            syn::Meta::NameValue(_) => {
                return Err(syn::Error::new(
                    attr.span(),
                    "Unsupported #[trackable = ...] syntax. Use #[trackable], #[trackable(false)], #[trackable(context = \"...\")]",
                ));
            }
        };

        let mut marker = Marker {
            context: None,
            trackable: true,
        };
        // Bare `#[trackable]` marks; `name`/`aware`/`skip` alone do not.
        let mut marks = args.is_empty();
        for arg in args {
            match arg {
                TrackableArg::Flag(value) => {
                    marker.trackable = value;
                    marks = true;
                }
                TrackableArg::Context(context) => {
                    marker.context = Some(context);
                    marks = true;
                }
                TrackableArg::Name(name) => options.name = Some(name),
                TrackableArg::Aware => options.aware = true,
                TrackableArg::Skip => options.skip = true,
            }
        }

        if marks {
            if options
                .markers
                .iter()
                .any(|existing| existing.context == marker.context)
            {
                return Err(syn::Error::new(
                    attr.span(),
                    "Duplicate #[trackable] marker for the same context",
                ));
            }
            options.markers.push(marker);
        }
    }

    Ok(options)
}

fn has_attr(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

fn marker_calls(markers: &[Marker]) -> Vec<TokenStream2> {
    markers
        .iter()
        .map(|marker| {
            let trackable = marker.trackable;
            match &marker.context {
                Some(context) => quote!(.trackable_in(#context, #trackable)),
                None => quote!(.trackable(#trackable)),
            }
        })
        .collect()
}

fn expand_trackable(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Trackable does not support generic structs yet",
        ));
    }

    let type_options = parse_trackable_options(&input.attrs)?;
    if type_options.skip {
        return Err(syn::Error::new(
            struct_name.span(),
            "#[trackable(skip)] is only valid on fields",
        ));
    }

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Trackable can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Trackable requires named fields",
            ));
        }
    };

    let type_name = type_options
        .name
        .clone()
        .unwrap_or_else(|| struct_name.unraw().to_string());
    let class_markers = marker_calls(&type_options.markers);

    let mut properties = Vec::new();
    let mut property_consts = Vec::new();
    let mut capabilities = Vec::new();
    let mut helpers = Vec::new();
    let mut key_field: Option<Ident> = None;

    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Trackable requires named fields"))?;
        let ty = field.ty;
        let bare = ident.unraw();

        if has_attr(&field.attrs, "persist_request") {
            let helper = format_ident!("__persist_requests_{}", bare);
            helpers.push(quote! {
                fn #helper(target: &#struct_name) -> ::settings_tracker::Signal {
                    ::std::clone::Clone::clone(&target.#ident)
                }
            });
            capabilities.push(quote!(.persist_requests(#helper)));
            continue;
        }

        if has_attr(&field.attrs, "event_source") {
            let helper = format_ident!("__event_source_{}", bare);
            helpers.push(quote! {
                fn #helper(target: &#struct_name) -> &::settings_tracker::EventHub {
                    &target.#ident
                }
            });
            capabilities.push(quote!(.event_source(#helper)));
            continue;
        }

        let options = parse_trackable_options(&field.attrs)?;
        if options.aware {
            return Err(syn::Error::new(
                ident.span(),
                "#[trackable(aware)] is only valid on the struct",
            ));
        }
        let is_key = has_attr(&field.attrs, "tracking_key");
        if options.skip {
            if is_key {
                return Err(syn::Error::new(
                    ident.span(),
                    "#[trackable(skip)] cannot be combined with #[tracking_key]",
                ));
            }
            continue;
        }

        if is_key {
            if let Some(existing) = &key_field {
                return Err(syn::Error::new(
                    ident.span(),
                    format!(
                        "Only one field may be marked #[tracking_key]; '{}' already is",
                        existing
                    ),
                ));
            }
            key_field = Some(ident.clone());
        }

        let property_name = options
            .name
            .clone()
            .unwrap_or_else(|| to_pascal_case(&bare));
        let markers = marker_calls(&options.markers);
        let key_call = if is_key { quote!(.key()) } else { quote!() };

        properties.push(quote! {
            .property(
                ::settings_tracker::Property::new(
                    #property_name,
                    |target: &#struct_name| &target.#ident,
                    |target: &mut #struct_name, value: #ty| target.#ident = value,
                )
                #(#markers)*
                #key_call
            )
        });

        let const_name = format_ident!("{}_PROPERTY", bare.to_string().to_uppercase());
        property_consts.push(quote! {
            pub const #const_name: ::settings_tracker::PropertyRef<#struct_name> =
                ::settings_tracker::PropertyRef::new(#property_name);
        });
    }

    if type_options.aware {
        capabilities.push(quote!(.tracking_aware()));
    }

    Ok(quote! {
        impl #struct_name {
            #(#property_consts)*
        }

        impl ::settings_tracker::Trackable for #struct_name {
            fn describe() -> ::settings_tracker::TrackResult<::settings_tracker::TypeDescriptor<Self>> {
                #(#helpers)*

                ::settings_tracker::TypeDescriptor::builder(#type_name)
                    #(#class_markers)*
                    #(#properties)*
                    #(#capabilities)*
                    .build()
            }
        }
    })
}

/// `font_size` -> `FontSize`; `r#type` -> `Type`.
fn to_pascal_case(ident: &Ident) -> String {
    let field = ident.unraw().to_string();
    let pascal = field
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<String>();
    if pascal.is_empty() { field } else { pascal }
}
