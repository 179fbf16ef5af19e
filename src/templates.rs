//! The invoice HTML template and the tera renderer that fills it.
//!
//! Helpers are registered as filters on a [`Tera`] instance owned by
//! [`InvoiceRenderer`]; nothing is registered globally.

use std::collections::HashMap;

use serde_json::Value;
use tera::{Context, Filter, Tera};

use crate::error::InvoiceError;
use crate::format::{self, AssetDir};
use crate::order::{Address, Order, Shop};

/// Name the template is registered under. The `.html` suffix turns on
/// tera's autoescaping.
pub const INVOICE_TEMPLATE_NAME: &str = "invoice.html";

/// Tax invoice template (tera / Jinja2 syntax).
///
/// Expects `order` and `shop` in the context and the `money`,
/// `address_markup` and `asset_uri` filters.
pub fn invoice_template() -> &'static str {
    r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Invoice {{ order.order_number }}</title>
  <style>
    body {
      font-family: Arial, sans-serif;
      font-size: 14px;
      margin: 0;
    }
    /* Light horizontal lines only */
    table {
      width: 100%;
      border-collapse: collapse;
      margin-top: 1em;
    }
    thead tr {
      border-top: 1px solid #ddd;
      border-bottom: 1px solid #ddd;
    }
    tbody tr {
      border-bottom: 1px solid #ddd;
    }
    th, td {
      padding: 12px;
      text-align: left;
    }
    th.price, td.price {
      text-align: right;
    }
    /* No vertical column borders */
    table, th, td {
      border-left: none !important;
      border-right: none !important;
      border-style: none !important;
    }
  </style>
</head>
<body>
  <!-- Header -->
  <div style="margin-top: 1.5em; margin-bottom: 1.5em;">
    <img src="{{ 'logo.png' | asset_uri }}" style="width: 210px;">
    <p style="margin-top: 1.5em;">
      <strong style="font-size: 1.7em; color: #00B67A;">FOR ALL THINGS TECH</strong><br />
      Visit: <a href="https://bits-mart.com/" target="_blank" style="text-decoration: none;">bits-mart.com</a>
      {% if shop.phone %}<br /> Phone: {{ shop.phone }}{% endif %}
    </p>
  </div>

  <!-- Invoice header -->
  <div style="display: flex; justify-content: space-between; align-items: flex-start; margin-top: 2em;">
    <h1 style="margin: 0;">Tax Invoice</h1>
    <div style="text-align: right;">
      <p style="margin: 0;">
        <strong>Invoice Number: {{ order.order_number }}</strong><br />
        {% if order.po_number %}PO: {{ order.po_number }}<br />{% endif %}
        Invoice Date: {{ order.created_at }}
      </p>
    </div>
  </div>

  <!-- Addresses -->
  <div style="display: flex; justify-content: space-between; margin-top: 2em;">
    <div style="width: 30%;">
      <strong>From</strong><br/>
      {{ shop.address }}<br/>
      ABN: 90 628 950 676
    </div>
    {% if order.billing_address %}
    <div style="width: 30%;">
      <strong>Bill to</strong><br/>
      {{ order.billing_address | address_markup | safe }}
    </div>
    {% endif %}
    {% if order.shipping_address %}
    <div style="width: 30%;">
      <strong>Ship to</strong><br/>
      {{ order.shipping_address | address_markup | safe }}
      {% if order.shipping_address.phone %}<br>{{ order.shipping_address.phone }}{% endif %}
    </div>
    {% endif %}
  </div>

  <hr style="margin: 2em 0;" />

  <!-- Order table -->
  <h2>Order Details</h2>
  <table>
    <thead>
      <tr>
        <th>Qty</th>
        <th>Item</th>
        <th class="price">Price</th>
      </tr>
    </thead>
    <tbody>
      {% for item in order.line_items %}
      <tr>
        <td>{{ item.quantity }}</td>
        <td>
          {{ item.title }} <br>
          {% if item.discount_allocations %}
          <div style="font-size: 12px; color: gray;">
            {% for discount in item.discount_allocations %}
              <br>{{ discount.title }} (-{{ discount.amount | money }})
            {% endfor %}
          </div>
          {% endif %}
        </td>
        <td class="price">
          {% if item.original_price != item.final_price %}
            <span style="text-decoration: line-through; color: gray;">{{ item.original_price | money }}</span><br>
          {% endif %} <br>
          {{ item.final_price | money }}
        </td>
      </tr>
      {% endfor %}

      <!-- Totals -->
      <tr>
        <td colspan="2" style="text-align: right; padding: 12px;">Subtotal</td>
        <td class="price">{{ order.subtotal_price | money }}</td>
      </tr>
      <tr>
        <td colspan="2" style="text-align: right; padding: 12px;">Tax</td>
        <td class="price">{{ order.tax_price | money }}</td>
      </tr>
      <tr>
        <td colspan="2" style="text-align: right; padding: 12px;">Shipping</td>
        <td class="price">{% if order.shipping_price == 0.0 %}FREE{% else %}{{ order.shipping_price | money }}{% endif %}</td>
      </tr>
      <tr>
        <td colspan="2" style="text-align: right; padding: 12px;"><strong>Total</strong></td>
        <td class="price"><strong>{{ order.total_price | money }}</strong></td>
      </tr>
      <tr>
        <td colspan="2" style="text-align: right; padding: 12px;">Total Paid</td>
        <td class="price">{{ order.net_payment | money }}</td>
      </tr>
    </tbody>
  </table>

  {% if order.note %}
  <div style="margin-top: 2em;">
    <strong>Note:</strong><br />
    {{ order.note }}
  </div>
  {% endif %}

  <p style="margin-top: 2em;">
    If you have any questions, please send an email to
    <a href="mailto:accounts@bits-mart.com?subject=BITSmart%20Order%20{{ order.order_number }}"
       style="text-decoration: none; color: #000;">
       <strong>accounts@bits-mart.com</strong>
    </a>
  </p>
</body>
</html>
"##
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

fn money_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    format::money_value(value)
        .map(Value::String)
        .map_err(|e| tera::Error::msg(e.to_string()))
}

fn address_markup_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let address: Address = serde_json::from_value(value.clone())
        .map_err(|e| tera::Error::msg(format!("not an address: {e}")))?;
    Ok(Value::String(format::address_to_markup(&address)))
}

/// `'logo.png' | asset_uri` → `file:///abs/static/logo.png`.
struct AssetUriFilter {
    assets: AssetDir,
}

impl Filter for AssetUriFilter {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = value
            .as_str()
            .ok_or_else(|| tera::Error::msg(format!("asset_uri expects a file name, got {value}")))?;
        self.assets
            .uri(name)
            .map(Value::String)
            .map_err(|e| tera::Error::msg(e.to_string()))
    }

    // Percent-encoded URIs contain nothing that needs escaping.
    fn is_safe(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders orders into invoice HTML.
pub struct InvoiceRenderer {
    tera: Tera,
    assets: AssetDir,
}

impl InvoiceRenderer {
    /// Renderer using the default `static` asset directory.
    pub fn new() -> Result<Self, InvoiceError> {
        Self::with_assets(AssetDir::default())
    }

    pub fn with_assets(assets: AssetDir) -> Result<Self, InvoiceError> {
        let mut tera = Tera::default();
        tera.add_raw_template(INVOICE_TEMPLATE_NAME, invoice_template())?;
        tera.register_filter("money", money_filter);
        tera.register_filter("address_markup", address_markup_filter);
        tera.register_filter(
            "asset_uri",
            AssetUriFilter {
                assets: assets.clone(),
            },
        );
        Ok(Self { tera, assets })
    }

    pub fn assets(&self) -> &AssetDir {
        &self.assets
    }

    /// Fill the template for one order.
    pub fn render(&self, order: &Order, shop: &Shop) -> Result<String, InvoiceError> {
        // Surface an unusable asset directory as such rather than as a
        // template failure.
        let dir = self.assets.resolve()?;
        log::debug!(
            "rendering invoice {} with {} line item(s), {} discounted (assets in {})",
            order.order_number,
            order.line_items.len(),
            order.line_items.iter().filter(|item| item.is_discounted()).count(),
            dir.display()
        );

        let mut context = Context::new();
        context.insert("order", order);
        context.insert("shop", shop);
        let html = self.tera.render(INVOICE_TEMPLATE_NAME, &context)?;
        log::debug!("invoice HTML is {} bytes", html.len());
        Ok(html)
    }
}
