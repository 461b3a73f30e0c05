//! Generated SCSS for one sprite map.
//!
//! The output is a set of variables, a data table keyed by image name, and
//! functions and mixins reading from that table. Sprite mode and no-sprite
//! mode expose the same function and mixin names with the same parameters,
//! so stylesheets using them work unchanged in either mode.
//!
//! Variables, functions and mixins are named after the map name without the
//! retina suffix. A `@2x` map therefore defines the same names as its 1x
//! sibling and is meant to be imported in a separate scope, e.g. a media
//! query.

use std::fmt::{self, Write};

use crate::collect::{ImageEntry, SpriteMap};
use crate::pack::{Rect, SheetMetadata};
use crate::selectors::{PseudoState, Selectors};

/// CSS pixel length, zero is a bare `0`.
pub fn px(value: u32) -> String {
    match value {
        0 => "0".to_string(),
        n => format!("{n}px"),
    }
}

fn rect_fields(rect: &Rect) -> String {
    format!(
        "x: {}, y: {}, width: {}, height: {}",
        px(rect.x),
        px(rect.y),
        px(rect.width),
        px(rect.height)
    )
}

/// Render the source for a packed sheet.
///
/// `key` names the placeholder rule. `sheet_url` already carries it in the
/// file name.
pub fn render_sprite(
    map: &SpriteMap,
    selectors: &Selectors<'_>,
    sheet: &SheetMetadata,
    key: &str,
    sheet_url: &str,
) -> Result<String, fmt::Error> {
    let name = &map.name;
    let placeholder = format!("%{name}-{key}");

    let mut variables = variables(map)?;
    writeln!(variables, "${name}-image-width: {};", px(sheet.width))?;
    writeln!(variables, "${name}-image-height: {};", px(sheet.height))?;

    let mut base = String::new();
    writeln!(
        base,
        r##"{placeholder} {{
    background-image: url('{sheet_url}');
    background-repeat: no-repeat;
    @if ${name}-pixel-ratio != 1 {{
        background-size: #{{${name}-image-width / ${name}-pixel-ratio}} #{{${name}-image-height / ${name}-pixel-ratio}};
    }}
}}
#{{${name}-sprite-base-class}} {{
    @extend {placeholder};
}}"##
    )?;

    let mut entries = Vec::with_capacity(selectors.selectors.len());
    for image in &selectors.selectors {
        let mut entry = format!("    {}: (\n        {}", image.name, rect_fields(&image.rect));
        for (state, variant) in selectors.states_of(&image.name) {
            write!(entry, ", {state}: ({})", rect_fields(&variant.rect))?;
        }
        entry.push_str("\n    )");
        entries.push(entry);
    }

    let mut position = String::new();
    writeln!(
        position,
        r##"@mixin {name}-sprite-magic-background-position($sprite-data, $offset-x: 0, $offset-y: 0) {{
    $x: $offset-x - map-get($sprite-data, 'x');
    $y: $offset-y - map-get($sprite-data, 'y');
    background-position: #{{$x / ${name}-pixel-ratio}} #{{$y / ${name}-pixel-ratio}};
}}"##
    )?;

    let mut states = String::new();
    writeln!(
        states,
        r##"@mixin {name}-sprite-selectors(
    $sprite-name, $full-sprite-name, $offset-x: 0, $offset-y: 0,
    $unsupported: false, $separator: ${name}-class-separator
) {{
    $sprite-data: map-get(${name}-sprites, $sprite-name);
    @each $state in $sprite-selectors {{
        @if map-has-key($sprite-data, $state) {{
            $sprite-class: "#{{$full-sprite-name}}#{{$separator}}#{{$state}}";
            &:#{{$state}}, &.#{{$sprite-class}} {{
                @include {name}-sprite-magic-background-position(map-get($sprite-data, $state), $offset-x, $offset-y);
            }}
        }}
    }}
}}"##
    )?;

    let mut sprite = String::new();
    writeln!(
        sprite,
        r##"@mixin {name}-sprite(
    $sprite, $dimensions: ${name}-sprite-dimensions, $offset-x: 0, $offset-y: 0, $unsupported: false,
    $use-magic-selectors: not $disable-magic-sprite-selectors, $separator: ${name}-class-separator
) {{
    $sprite-data: map-get(${name}-sprites, $sprite);
    @extend {placeholder};
    @include {name}-sprite-magic-background-position($sprite-data, $offset-x, $offset-y);
    @if $dimensions {{
        @include {name}-sprite-dimensions($sprite);
    }}
    @if $use-magic-selectors {{
        @include {name}-sprite-selectors(
            $sprite, $sprite, $offset-x, $offset-y, $unsupported, $separator
        );
    }}
}}"##
    )?;

    let [width, height] = accessors(name)?;

    let chunks = [
        variables,
        base,
        table(name, &entries)?,
        width,
        height,
        dimensions(name)?,
        position,
        states,
        sprite,
        all_sprites(name, selectors, "")?,
    ];

    Ok(chunks.join("\n"))
}

/// Render the source for individually referenced images.
///
/// Rectangles of the images must hold their pixel size. `image_url` maps an
/// image to the URL it is served from.
pub fn render_no_sprite(
    map: &SpriteMap,
    selectors: &Selectors<'_>,
    image_url: impl Fn(&ImageEntry) -> String,
) -> Result<String, fmt::Error> {
    let name = &map.name;

    let mut variables = variables(map)?;
    writeln!(variables, "${name}-no-sprite: true;")?;

    let mut entries = Vec::with_capacity(selectors.selectors.len());
    for image in &selectors.selectors {
        let mut entry = format!(
            "    {}: (\n        url: '{}',\n        width: {}, height: {}",
            image.name,
            image_url(image),
            px(image.rect.width),
            px(image.rect.height)
        );
        for (state, variant) in selectors.states_of(&image.name) {
            write!(
                entry,
                ", {state}: (\n            url: '{}',\n            width: {}, height: {}\n        )",
                image_url(variant),
                px(variant.rect.width),
                px(variant.rect.height)
            )?;
        }
        entry.push_str("\n    )");
        entries.push(entry);
    }

    let mut states = String::new();
    writeln!(
        states,
        r##"@mixin {name}-sprite-selectors(
    $sprite-name, $full-sprite-name, $offset-x: 0, $offset-y: 0,
    $unsupported: false, $separator: ${name}-class-separator
) {{
    $sprite-data: map-get(${name}-sprites, $sprite-name);
    @each $state in $sprite-selectors {{
        @if map-has-key($sprite-data, $state) {{
            $state-data: map-get($sprite-data, $state);
            $sprite-class: "#{{$full-sprite-name}}#{{$separator}}#{{$state}}";
            &:#{{$state}}, &.#{{$sprite-class}} {{
                background-image: url(map-get($state-data, 'url'));
                @if ${name}-pixel-ratio != 1 {{
                    background-size: #{{map-get($state-data, 'width') / ${name}-pixel-ratio}} #{{map-get($state-data, 'height') / ${name}-pixel-ratio}};
                }}
            }}
        }}
    }}
}}"##
    )?;

    let mut sprite = String::new();
    writeln!(
        sprite,
        r##"@mixin {name}-sprite(
    $sprite, $dimensions: ${name}-sprite-dimensions, $offset-x: 0, $offset-y: 0, $unsupported: false,
    $use-magic-selectors: not $disable-magic-sprite-selectors, $separator: ${name}-class-separator
) {{
    $sprite-data: map-get(${name}-sprites, $sprite);
    background-image: url(map-get($sprite-data, 'url'));
    background-repeat: no-repeat;
    @if ${name}-pixel-ratio != 1 {{
        background-size: #{{map-get($sprite-data, 'width') / ${name}-pixel-ratio}} #{{map-get($sprite-data, 'height') / ${name}-pixel-ratio}};
    }}
    @if $dimensions {{
        @include {name}-sprite-dimensions($sprite);
    }}
    @if $use-magic-selectors {{
        @include {name}-sprite-selectors(
            $sprite, $sprite, $offset-x, $offset-y, $unsupported, $separator
        );
    }}
}}"##
    )?;

    let base_rule = format!(
        "\n    #{{${name}-sprite-base-class}} {{\n        background-repeat: no-repeat;\n    }}"
    );

    let [width, height] = accessors(name)?;

    let chunks = [
        variables,
        table(name, &entries)?,
        width,
        height,
        dimensions(name)?,
        states,
        sprite,
        all_sprites(name, selectors, &base_rule)?,
    ];

    Ok(chunks.join("\n"))
}

fn variables(map: &SpriteMap) -> Result<String, fmt::Error> {
    let name = &map.name;
    let states = PseudoState::ALL.map(PseudoState::as_str).join(", ");

    let mut out = String::new();
    writeln!(
        out,
        r##"$sprite-selectors: {states} !default;
$disable-magic-sprite-selectors: false !default;
$default-sprite-separator: '-' !default;
${name}-sprite-dimensions: false !default;
${name}-class-separator: $default-sprite-separator !default;
${name}-sprite-base-class: '.{name}#{{${name}-class-separator}}sprite' !default;
${name}-pixel-ratio: {};"##,
        map.pixel_ratio
    )?;

    Ok(out)
}

fn table(name: &str, entries: &[String]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "${name}-sprites: (")?;
    if !entries.is_empty() {
        writeln!(out, "{}", entries.join(",\n"))?;
    }
    writeln!(out, ");")?;
    Ok(out)
}

fn accessors(name: &str) -> Result<[String; 2], fmt::Error> {
    let accessor = |prop: &str| -> Result<String, fmt::Error> {
        let mut out = String::new();
        writeln!(
            out,
            r##"@function {name}-sprite-{prop}($sprite) {{
    @return map-get(map-get(${name}-sprites, $sprite), '{prop}') / ${name}-pixel-ratio;
}}"##
        )?;
        Ok(out)
    };

    Ok([accessor("width")?, accessor("height")?])
}

fn dimensions(name: &str) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        r##"@mixin {name}-sprite-dimensions($sprite) {{
    width: {name}-sprite-width($sprite);
    height: {name}-sprite-height($sprite);
}}"##
    )?;
    Ok(out)
}

fn all_sprites(name: &str, selectors: &Selectors<'_>, prelude: &str) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write!(out, "@mixin all-{name}-sprites($dimensions: ${name}-sprite-dimensions) {{{prelude}")?;
    for image in &selectors.selectors {
        let image = &image.name;
        write!(
            out,
            "\n    .{name}-{image} {{\n        @include {name}-sprite({image}, $dimensions);\n    }}"
        )?;
    }
    writeln!(out, "\n}}")?;
    Ok(out)
}
